//! Time utilities for the tick loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 20; // 20 ticks per second
pub const TICK_DURATION_MS: u64 = 1_000 / SIMULATION_TPS as u64;

/// Millisecond clock used by the decision engine.
///
/// The engine never reads wall time directly so tests can drive it tick by
/// tick with a [`ManualClock`].
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Monotonic clock measured from construction
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Clock advanced explicitly by the caller
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Resettable timer over an engine clock.
///
/// A timer that was never reset counts as having passed any delay.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    last_reset: Option<u64>,
}

impl Timer {
    pub fn new() -> Self {
        Self { last_reset: None }
    }

    pub fn reset(&mut self, now_ms: u64) {
        self.last_reset = Some(now_ms);
    }

    pub fn clear(&mut self) {
        self.last_reset = None;
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> Option<u64> {
        self.last_reset.map(|t| now_ms.saturating_sub(t))
    }

    pub fn passed(&self, now_ms: u64, delay_ms: f64) -> bool {
        match self.elapsed_ms(now_ms) {
            Some(elapsed) => elapsed as f64 >= delay_ms,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_timer_has_passed_everything() {
        let timer = Timer::new();
        assert!(timer.passed(0, 10_000.0));
        assert_eq!(timer.elapsed_ms(5), None);
    }

    #[test]
    fn timer_measures_against_manual_clock() {
        let clock = ManualClock::new(1_000);
        let mut timer = Timer::new();
        timer.reset(clock.now_ms());

        clock.advance(499);
        assert!(!timer.passed(clock.now_ms(), 500.0));
        clock.advance(1);
        assert!(timer.passed(clock.now_ms(), 500.0));
        assert_eq!(timer.elapsed_ms(clock.now_ms()), Some(500));
    }

    #[test]
    fn tick_duration_matches_rate() {
        assert_eq!(TICK_DURATION_MS, 50);
    }
}
