//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the listener (fatal on failure, before any worker runs)
//! - Probe the dependency once and seed the health flag
//! - Register and start the signal watcher and the liveness worker
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Workers are registered before they are spawned
//! - The listener starts serving last, from `Service::run`

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::health::active::LivenessWorker;
use crate::health::probe::{scoped_probe, DependencyProbe, ProbeError, TcpProbe};
use crate::health::HealthState;
use crate::http::HttpServer;
use crate::lifecycle::listener::{ListenerError, ServiceListener};
use crate::lifecycle::shutdown::{ExitOutcome, ShutdownCoordinator};
use crate::lifecycle::signals::{OsSignals, SignalSource, SignalWatcher};
use crate::observability::metrics;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("dependency {dependency} unreachable at startup: {source}")]
    Dependency {
        dependency: String,
        #[source]
        source: ProbeError,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

/// A started service: workers are running, the listener is bound.
pub struct Service {
    coordinator: ShutdownCoordinator,
    server: HttpServer,
}

impl Service {
    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.coordinator
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        self.server.local_addr()
    }

    /// Serve until shutdown, then run the shutdown ladder.
    pub async fn run(self) -> Result<ExitOutcome, ListenerError> {
        self.coordinator.run(self.server).await
    }
}

/// Start the service with the process signal handlers and a TCP probe of
/// the configured database.
pub async fn start(config: &ServerConfig) -> Result<Service, StartupError> {
    let signals = OsSignals::install().map_err(StartupError::Signals)?;
    start_with(config, TcpProbe::from_config(&config.database), signals).await
}

/// Start the service with explicit collaborators.
pub async fn start_with<P, S>(
    config: &ServerConfig,
    probe: P,
    signals: S,
) -> Result<Service, StartupError>
where
    P: DependencyProbe,
    S: SignalSource,
{
    let coordinator = ShutdownCoordinator::new();

    let server = HttpServer::bind(&config.listener, coordinator.health().clone()).await?;

    if let Err(source) = scoped_probe(&probe, coordinator.hierarchy().hard()).await {
        return Err(StartupError::Dependency {
            dependency: probe.name().to_string(),
            source,
        });
    }
    coordinator.health().set(HealthState::Healthy);
    metrics::record_dependency_health(true);

    let workers = coordinator.workers();
    workers.spawn(
        "signal-watcher",
        SignalWatcher::new(signals, coordinator.clone()).run(),
    );
    workers.spawn(
        "liveness",
        LivenessWorker::new(probe, coordinator.clone()).run(),
    );

    tracing::info!(pending_workers = workers.pending(), "Startup complete");
    Ok(Service { coordinator, server })
}
