//! Shutdown coordination for the service.
//!
//! # Escalation ladder
//! ```text
//! stop requested, or serve() returns on its own (whichever comes first)
//!     → cancel soft, seal worker registry
//!     → race 6s timer against "all workers done" (listener drain included)
//!         done  → Clean
//!         timer → cancel hard
//!                 → race 3s timer against "all workers done"
//!                     done  → DrainedAfterHardCancel
//!                     timer → Abandoned
//! ```
//!
//! The listener runs as a registered worker and sets the exiting flag when
//! `serve()` returns. Nothing in the ladder is retried; the process always
//! exits within the sum of the two budgets once shutdown has begun.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

use crate::health::HealthFlag;
use crate::lifecycle::cancel::CancellationHierarchy;
use crate::lifecycle::exiting::ExitingFlag;
use crate::lifecycle::listener::{
    stop_channel, ListenerError, ServiceListener, StopHandle, StopSignal,
};
use crate::lifecycle::workers::WorkerRegistry;
use crate::observability::metrics;

/// Budget for workers to finish once shutdown began.
pub const FIRST_DRAIN_BUDGET: Duration = Duration::from_secs(6);

/// Budget for workers to finish after hard cancellation.
pub const FINAL_DRAIN_BUDGET: Duration = Duration::from_secs(3);

/// How the shutdown ladder ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Every worker finished within the first budget.
    Clean,
    /// Workers finished only after hard cancellation.
    DrainedAfterHardCancel,
    /// Workers were still running when the final budget expired.
    Abandoned,
}

impl ExitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitOutcome::Clean => "clean",
            ExitOutcome::DrainedAfterHardCancel => "drained_after_hard_cancel",
            ExitOutcome::Abandoned => "abandoned",
        }
    }

    /// Process exit code. Forced exits are deliberate, not failures.
    pub fn exit_code(&self) -> i32 {
        0
    }
}

#[derive(Debug)]
struct Inner {
    hierarchy: CancellationHierarchy,
    exiting: ExitingFlag,
    workers: WorkerRegistry,
    health: HealthFlag,
    stop: StopHandle,
    stop_signal: StopSignal,
}

/// Owner of all process lifecycle state.
///
/// Cheap to clone; every worker holds a handle to the same state.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (stop, stop_signal) = stop_channel();
        Self {
            inner: Arc::new(Inner {
                hierarchy: CancellationHierarchy::new(),
                exiting: ExitingFlag::new(),
                workers: WorkerRegistry::new(),
                health: HealthFlag::new(),
                stop,
                stop_signal,
            }),
        }
    }

    pub fn hierarchy(&self) -> &CancellationHierarchy {
        &self.inner.hierarchy
    }

    pub fn exiting(&self) -> &ExitingFlag {
        &self.inner.exiting
    }

    pub fn workers(&self) -> &WorkerRegistry {
        &self.inner.workers
    }

    pub fn health(&self) -> &HealthFlag {
        &self.inner.health
    }

    /// Whether the listener has been asked to stop.
    pub fn is_stopping(&self) -> bool {
        self.inner.stop.is_stopped()
    }

    /// Begin graceful shutdown: stop accepting new work and let in-flight
    /// work drain until hard cancellation.
    pub fn shutdown(&self) {
        self.inner.hierarchy.cancel_soft();
        if self.inner.stop.stop(self.inner.hierarchy.hard().clone()) {
            tracing::info!("Shutdown requested, listener draining");
        }
    }

    /// Serve on `listener` and run the shutdown ladder once a stop is
    /// requested or serving ends, whichever comes first.
    ///
    /// The listener drain counts as a worker, so a stuck drain is bounded by
    /// the ladder. A serve failure still goes through the ladder before being
    /// returned.
    pub async fn run<L: ServiceListener>(
        &self,
        listener: L,
    ) -> Result<ExitOutcome, ListenerError> {
        let coordinator = self.clone();
        let stop = self.inner.stop_signal.clone();
        let mut serving = self.inner.workers.spawn("listener", async move {
            let served = listener.serve(stop).await;
            if let Err(e) = &served {
                tracing::error!(error = %e, "Listener failed");
            }
            coordinator.mark_exiting();
            served
        });

        let mut stop = self.inner.stop_signal.clone();
        let returned = tokio::select! {
            biased;
            served = &mut serving => Some(served),
            _ = stop.requested() => None,
        };

        let outcome = self.wind_down().await;

        let served = match returned {
            Some(served) => served,
            None if outcome == ExitOutcome::Abandoned && !serving.is_finished() => {
                serving.abort();
                return Ok(outcome);
            }
            // The listener released its guard, so its task is about to finish.
            None => serving.await,
        };
        served?.map(|()| outcome)
    }

    /// Run the shutdown ladder. Idempotent in effect, but meant to be called once.
    pub async fn wind_down(&self) -> ExitOutcome {
        let started = Instant::now();
        self.inner.hierarchy.cancel_soft();
        self.inner.workers.seal();

        let outcome = self.wait_for_workers().await;
        self.mark_exiting();
        tracing::info!(
            outcome = outcome.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Shutdown complete"
        );
        metrics::record_shutdown(outcome.as_str());
        outcome
    }

    fn mark_exiting(&self) {
        if self.inner.exiting.set() {
            tracing::info!("exit");
        }
    }

    async fn wait_for_workers(&self) -> ExitOutcome {
        let workers = &self.inner.workers;

        let timer = time::sleep(FIRST_DRAIN_BUDGET);
        tokio::pin!(timer);

        tokio::select! {
            biased;
            _ = workers.all_done() => return ExitOutcome::Clean,
            _ = &mut timer => {}
        }

        tracing::warn!(
            pending = workers.pending(),
            budget_secs = FIRST_DRAIN_BUDGET.as_secs(),
            "force exit"
        );
        self.inner.hierarchy.cancel_hard();

        timer.as_mut().reset(Instant::now() + FINAL_DRAIN_BUDGET);
        tokio::select! {
            biased;
            _ = workers.all_done() => ExitOutcome::DrainedAfterHardCancel,
            _ = &mut timer => {
                tracing::error!(
                    pending = workers.pending(),
                    "Workers did not stop after hard shutdown, abandoning them"
                );
                ExitOutcome::Abandoned
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_cancels_soft_and_stops_listener() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.shutdown();
        coordinator.shutdown();

        assert!(coordinator.hierarchy().is_soft_cancelled());
        assert!(!coordinator.hierarchy().is_hard_cancelled());
        assert!(coordinator.is_stopping());
    }

    #[tokio::test(start_paused = true)]
    async fn no_workers_exit_clean() {
        let coordinator = ShutdownCoordinator::new();
        let started = Instant::now();

        assert_eq!(coordinator.wind_down().await, ExitOutcome::Clean);
        assert!(started.elapsed() < FIRST_DRAIN_BUDGET);
        assert!(coordinator.exiting().is_set());
        assert!(coordinator.hierarchy().is_soft_cancelled());
        assert!(!coordinator.hierarchy().is_hard_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_worker_is_abandoned() {
        let coordinator = ShutdownCoordinator::new();
        let _stuck = coordinator.workers().register("stuck");
        let started = Instant::now();

        assert_eq!(coordinator.wind_down().await, ExitOutcome::Abandoned);
        assert!(coordinator.hierarchy().is_hard_cancelled());
        let elapsed = started.elapsed();
        assert!(elapsed >= FIRST_DRAIN_BUDGET + FINAL_DRAIN_BUDGET);
        assert!(elapsed < FIRST_DRAIN_BUDGET + FINAL_DRAIN_BUDGET + Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn hard_cancel_unblocks_worker() {
        let coordinator = ShutdownCoordinator::new();
        let hard = coordinator.hierarchy().hard().clone();
        coordinator
            .workers()
            .spawn("hard-only", async move { hard.cancelled().await });
        let started = Instant::now();

        assert_eq!(
            coordinator.wind_down().await,
            ExitOutcome::DrainedAfterHardCancel
        );
        let elapsed = started.elapsed();
        assert!(elapsed >= FIRST_DRAIN_BUDGET);
        assert!(elapsed < FIRST_DRAIN_BUDGET + Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn soft_aware_worker_exits_clean() {
        let coordinator = ShutdownCoordinator::new();
        let soft = coordinator.hierarchy().soft().clone();
        coordinator.workers().spawn("soft", async move {
            soft.cancelled().await;
            time::sleep(Duration::from_secs(2)).await;
        });

        assert_eq!(coordinator.wind_down().await, ExitOutcome::Clean);
        assert!(!coordinator.hierarchy().is_hard_cancelled());
    }

    #[test]
    fn every_outcome_exits_zero() {
        for outcome in [
            ExitOutcome::Clean,
            ExitOutcome::DrainedAfterHardCancel,
            ExitOutcome::Abandoned,
        ] {
            assert_eq!(outcome.exit_code(), 0);
        }
    }
}
