//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified events per second
pub fn create_limiter(per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Evaluation fault warnings per second
pub const FAULT_LOG_RATE_LIMIT: u32 = 2;

/// Gate for repetitive diagnostics emitted from the tick loop or its workers
#[derive(Clone)]
pub struct LogLimiter {
    limiter: Arc<Limiter>,
}

impl LogLimiter {
    pub fn new(per_second: u32) -> Self {
        Self {
            limiter: create_limiter(per_second),
        }
    }

    /// Returns true if the next message may be logged
    pub fn allow(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for LogLimiter {
    fn default() -> Self {
        Self::new(FAULT_LOG_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_capped_by_quota() {
        let limiter = LogLimiter::new(2);
        let allowed = (0..10).filter(|_| limiter.allow()).count();
        assert_eq!(allowed, 2);
    }
}
