//! Single-flight evaluation scheduler
//!
//! At most one evaluation job is outstanding at any time. A finished job
//! publishes its outcome into a one-element slot; the tick drains the slot
//! with an exchange so every outcome is consumed exactly once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::{EvaluationError, SchedulerError};
use crate::util::rate_limit::LogLimiter;

use super::evaluator::{evaluate, EvaluationJob, EvaluationOutcome};

/// Clears the in-flight flag however the job ends
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Published outcome and the clear generation it belongs to, under one lock
#[derive(Default)]
struct Slot {
    /// Bumped by `clear` so jobs submitted earlier cannot publish
    generation: u64,
    outcome: Option<EvaluationOutcome>,
}

impl Slot {
    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.outcome = None;
    }
}

pub struct EvaluationScheduler {
    handle: Handle,
    in_flight: Arc<AtomicBool>,
    slot: Arc<Mutex<Slot>>,
    last_elapsed_us: Arc<AtomicU64>,
    fault_log: LogLimiter,
}

impl EvaluationScheduler {
    /// Bind to the current tokio runtime
    pub fn new() -> Result<Self, SchedulerError> {
        let handle = Handle::try_current().map_err(SchedulerError::NoRuntime)?;
        Ok(Self::with_handle(handle))
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            in_flight: Arc::new(AtomicBool::new(false)),
            slot: Arc::new(Mutex::new(Slot::default())),
            last_elapsed_us: Arc::new(AtomicU64::new(0)),
            fault_log: LogLimiter::default(),
        }
    }

    /// Start evaluating `job` unless a job is already running.
    ///
    /// Returns false without queueing anything when busy.
    pub fn submit(&self, job: EvaluationJob) -> bool {
        self.submit_with(move || evaluate(&job))
    }

    /// Start an arbitrary evaluation closure under the same single-flight rule
    pub fn submit_with<F>(&self, work: F) -> bool
    where
        F: FnOnce() -> Result<EvaluationOutcome, EvaluationError> + Send + 'static,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let guard = InFlightGuard(self.in_flight.clone());
        let slot = self.slot.clone();
        let submitted_generation = slot.lock().generation;
        let last_elapsed_us = self.last_elapsed_us.clone();
        let fault_log = self.fault_log.clone();

        self.handle.spawn(async move {
            let _guard = guard;

            let result = match tokio::task::spawn_blocking(work).await {
                Ok(result) => result,
                Err(err) => Err(EvaluationError::Panicked(err.to_string())),
            };

            match result {
                Ok(outcome) => {
                    last_elapsed_us.store(outcome.elapsed.as_micros() as u64, Ordering::Relaxed);
                    let mut slot = slot.lock();
                    if slot.generation != submitted_generation {
                        debug!(tick = outcome.snapshot_tick, "Dropping outcome from cleared cycle");
                        return;
                    }
                    // Replacing an unconsumed outcome keeps only the newest
                    slot.outcome = Some(outcome);
                }
                Err(err) => {
                    if fault_log.allow() {
                        warn!(error = %err, "Evaluation fault, no outcome this cycle");
                    }
                }
            }
        });

        true
    }

    /// Drain the published outcome, if any
    pub fn take_latest(&self) -> Option<EvaluationOutcome> {
        self.slot.lock().outcome.take()
    }

    pub fn is_idle(&self) -> bool {
        !self.in_flight.load(Ordering::Acquire)
    }

    /// Wall time of the most recently finished evaluation
    pub fn last_elapsed(&self) -> Duration {
        Duration::from_micros(self.last_elapsed_us.load(Ordering::Relaxed))
    }

    /// Discard the published outcome and anything still running
    pub fn clear(&self) {
        self.slot.lock().invalidate();
    }

    /// Wait for the running job, if any, to publish
    pub async fn wait_idle(&self) {
        while !self.is_idle() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn outcome(tick: u64) -> EvaluationOutcome {
        EvaluationOutcome {
            snapshot_tick: tick,
            ..Default::default()
        }
    }

    #[test]
    fn requires_a_runtime() {
        assert!(matches!(
            EvaluationScheduler::new(),
            Err(SchedulerError::NoRuntime(_))
        ));
    }

    #[tokio::test]
    async fn never_runs_two_jobs_at_once() {
        let scheduler = EvaluationScheduler::new().unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let (r, p) = (running.clone(), peak.clone());
        assert!(scheduler.submit_with(move || {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            let _ = release_rx.recv();
            r.fetch_sub(1, Ordering::SeqCst);
            Ok(outcome(1))
        }));

        for tick in 2..10 {
            let (r, p) = (running.clone(), peak.clone());
            let accepted = scheduler.submit_with(move || {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                r.fetch_sub(1, Ordering::SeqCst);
                Ok(outcome(tick))
            });
            assert!(!accepted);
        }

        release_tx.send(()).unwrap();
        scheduler.wait_idle().await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.take_latest().map(|o| o.snapshot_tick), Some(1));
    }

    #[tokio::test]
    async fn outcome_is_consumed_exactly_once() {
        let scheduler = EvaluationScheduler::new().unwrap();
        assert!(scheduler.submit_with(|| Ok(outcome(4))));
        scheduler.wait_idle().await;

        assert_eq!(scheduler.take_latest().map(|o| o.snapshot_tick), Some(4));
        assert!(scheduler.take_latest().is_none());
    }

    #[tokio::test]
    async fn panicking_job_yields_nothing_and_frees_the_slot() {
        let scheduler = EvaluationScheduler::new().unwrap();
        assert!(scheduler.submit_with(|| panic!("simulated evaluation crash")));
        scheduler.wait_idle().await;
        assert!(scheduler.take_latest().is_none());

        assert!(scheduler.submit_with(|| Ok(outcome(2))));
        scheduler.wait_idle().await;
        assert!(scheduler.take_latest().is_some());
    }

    #[tokio::test]
    async fn failed_job_publishes_nothing() {
        let scheduler = EvaluationScheduler::new().unwrap();
        assert!(scheduler.submit_with(|| Err(EvaluationError::NonFiniteActor)));
        scheduler.wait_idle().await;
        assert!(scheduler.take_latest().is_none());
    }

    #[tokio::test]
    async fn clear_discards_in_flight_result() {
        let scheduler = EvaluationScheduler::new().unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        assert!(scheduler.submit_with(move || {
            let _ = release_rx.recv();
            Ok(outcome(9))
        }));

        scheduler.clear();
        release_tx.send(()).unwrap();
        scheduler.wait_idle().await;
        assert!(scheduler.take_latest().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn clear_racing_a_finished_job_wins() {
        let scheduler = EvaluationScheduler::new().unwrap();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        assert!(scheduler.submit_with(move || {
            let _ = done_tx.send(());
            Ok(outcome(6))
        }));

        {
            // the finished job has to wait for the slot while the clear runs
            let mut slot = scheduler.slot.lock();
            done_rx.recv().unwrap();
            slot.invalidate();
        }
        scheduler.wait_idle().await;
        assert!(scheduler.take_latest().is_none());

        assert!(scheduler.submit_with(|| Ok(outcome(7))));
        scheduler.wait_idle().await;
        assert_eq!(scheduler.take_latest().map(|o| o.snapshot_tick), Some(7));
    }
}
