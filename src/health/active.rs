//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe the dependency
//! - Publish the result to the shared health flag
//! - Stop as soon as the process is exiting or hard shutdown begins

use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::health::probe::{scoped_probe, DependencyProbe, ProbeError};
use crate::health::state::{HealthFlag, HealthState};
use crate::lifecycle::ShutdownCoordinator;
use crate::observability::metrics;

/// Time between two liveness probes.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(15);

/// Periodic liveness prober for a single dependency.
pub struct LivenessWorker<P> {
    probe: P,
    health: HealthFlag,
    coordinator: ShutdownCoordinator,
}

impl<P: DependencyProbe> LivenessWorker<P> {
    pub fn new(probe: P, coordinator: ShutdownCoordinator) -> Self {
        Self {
            probe,
            health: coordinator.health().clone(),
            coordinator,
        }
    }

    /// Probe every [`PROBE_INTERVAL`] until exit or hard cancellation.
    ///
    /// The first probe runs one interval after start; the startup probe
    /// seeds the flag before that.
    pub async fn run(self) {
        tracing::info!(
            dependency = self.probe.name(),
            interval_secs = PROBE_INTERVAL.as_secs(),
            "Liveness worker starting"
        );

        let exiting = self.coordinator.exiting();
        let hard = self.coordinator.hierarchy().hard();

        let mut ticker = time::interval_at(Instant::now() + PROBE_INTERVAL, PROBE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = exiting.wait() => {
                    tracing::info!("Liveness worker observed exit, stopping");
                    break;
                }
                _ = hard.cancelled() => {
                    tracing::info!("Liveness worker received hard shutdown, stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.check().await;
                }
            }
        }
    }

    async fn check(&self) {
        tracing::debug!(dependency = self.probe.name(), "Probing dependency");

        let state = match scoped_probe(&self.probe, self.coordinator.hierarchy().hard()).await {
            Ok(()) => HealthState::Healthy,
            // Abandoned mid-flight; the loop exits on its next turn.
            Err(ProbeError::Cancelled) => return,
            Err(e) => {
                tracing::warn!(
                    dependency = self.probe.name(),
                    error = %e,
                    "Dependency probe failed"
                );
                HealthState::Unhealthy
            }
        };

        self.health.set(state);
        metrics::record_dependency_health(state == HealthState::Healthy);
    }
}
