//! Round-trip statistics and the extrapolation horizon derived from them

use std::collections::VecDeque;

use crate::config::{EngineSettings, ExtrapolateMode};

/// Round-trip samples kept for the moving average
pub const LATENCY_WINDOW: usize = 20;

/// Fixed-capacity FIFO of round-trip measurements in milliseconds
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, rtt_ms: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt_ms);
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().sum();
        Some(sum as f64 / self.samples.len() as f64)
    }

    pub fn average_or_zero(&self) -> f64 {
        self.average().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(LATENCY_WINDOW)
    }
}

/// Ticks to project targets forward, never negative and never above the
/// configured maximum
pub fn current_extrapolation_ticks(settings: &EngineSettings, latency_ms: i64, tick_ms: u64) -> u32 {
    let ticks = match settings.extrapolate_mode {
        ExtrapolateMode::Manual => settings.extrapolate_ticks,
        ExtrapolateMode::Auto => {
            let latency = latency_ms.max(0) as u64;
            (latency / tick_ms.max(1)).min(u32::MAX as u64) as u32
        }
    };
    ticks.min(settings.max_extrapolate_ticks)
}

/// Events counted over the trailing second
#[derive(Debug, Clone, Default)]
pub struct PerSecondCounter {
    stamps: VecDeque<u64>,
}

impl PerSecondCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, now_ms: u64) {
        self.stamps.push_back(now_ms);
        self.expire(now_ms);
    }

    pub fn count(&mut self, now_ms: u64) -> usize {
        self.expire(now_ms);
        self.stamps.len()
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
    }

    fn expire(&mut self, now_ms: u64) {
        while let Some(&front) = self.stamps.front() {
            if now_ms.saturating_sub(front) >= 1_000 {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extrapolation_is_clamped_to_maximum() {
        let settings = EngineSettings {
            max_extrapolate_ticks: 8,
            ..Default::default()
        };
        assert_eq!(current_extrapolation_ticks(&settings, 1_000, 50), 8);
        assert_eq!(current_extrapolation_ticks(&settings, 120, 50), 2);
    }

    #[test]
    fn negative_latency_yields_zero() {
        let settings = EngineSettings::default();
        assert_eq!(current_extrapolation_ticks(&settings, -300, 50), 0);
    }

    #[test]
    fn manual_mode_is_clamped_too() {
        let settings = EngineSettings {
            extrapolate_mode: ExtrapolateMode::Manual,
            extrapolate_ticks: 30,
            max_extrapolate_ticks: 8,
            ..Default::default()
        };
        assert_eq!(current_extrapolation_ticks(&settings, 0, 50), 8);
    }

    #[test]
    fn window_keeps_most_recent_samples() {
        let mut window = LatencyWindow::new(3);
        assert_eq!(window.average(), None);
        for rtt in [100, 200, 300, 400] {
            window.push(rtt);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.average(), Some(300.0));
    }

    #[test]
    fn counter_forgets_after_one_second() {
        let mut counter = PerSecondCounter::new();
        counter.record(0);
        counter.record(400);
        assert_eq!(counter.count(999), 2);
        assert_eq!(counter.count(1_000), 1);
        assert_eq!(counter.count(1_400), 0);
    }
}
