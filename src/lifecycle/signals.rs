//! OS signal handling.
//!
//! # States
//! ```text
//! Running
//!     signal          → coordinator.shutdown() → SoftShutdownRequested
//!     soft cancelled  → SoftShutdownRequested
//!     exiting         → Terminated
//! SoftShutdownRequested (5s grace timer armed on entry)
//!     second signal   → cancel hard → HardShutdownRequested
//!     grace elapsed   → cancel hard → HardShutdownRequested
//!     hard cancelled  → Terminated
//!     exiting         → Terminated
//! HardShutdownRequested
//!     hard observed   → Terminated
//! ```
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Signal delivery sits behind `SignalSource` so the ladder can be driven
//!   without touching the process's real handlers
//! - Exit events win over signals and timers polled in the same turn

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;

use crate::lifecycle::ShutdownCoordinator;
use crate::observability::metrics;

/// Time between the first termination signal and forced shutdown.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Termination signals the watcher reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl TerminationSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
        }
    }
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stream of termination signals.
pub trait SignalSource: Send + 'static {
    /// Next signal, or `None` once the source can deliver no more.
    fn recv(&mut self) -> impl Future<Output = Option<TerminationSignal>> + Send;
}

/// SIGINT and SIGTERM delivered to this process.
#[derive(Debug)]
pub struct OsSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Register the process signal handlers.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }
}

impl SignalSource for OsSignals {
    #[cfg(unix)]
    async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::select! {
            received = self.interrupt.recv() => received.map(|()| TerminationSignal::Interrupt),
            received = self.terminate.recv() => received.map(|()| TerminationSignal::Terminate),
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::signal::ctrl_c()
            .await
            .ok()
            .map(|()| TerminationSignal::Interrupt)
    }
}

/// In-process signal injection.
impl SignalSource for mpsc::UnboundedReceiver<TerminationSignal> {
    async fn recv(&mut self) -> Option<TerminationSignal> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}

/// Lifecycle of the signal watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Running,
    SoftShutdownRequested,
    HardShutdownRequested,
    Terminated,
}

/// Drives the soft → hard escalation from termination signals.
pub struct SignalWatcher<S> {
    signals: S,
    signals_open: bool,
    coordinator: ShutdownCoordinator,
    state: WatcherState,
}

impl<S: SignalSource> SignalWatcher<S> {
    pub fn new(signals: S, coordinator: ShutdownCoordinator) -> Self {
        Self {
            signals,
            signals_open: true,
            coordinator,
            state: WatcherState::Running,
        }
    }

    /// Run until the watcher reaches `Terminated`.
    pub async fn run(mut self) -> WatcherState {
        while self.state != WatcherState::Terminated {
            let next = self.step().await;
            if next != self.state {
                tracing::debug!(from = ?self.state, to = ?next, "Signal watcher transition");
            }
            self.state = next;
        }
        self.state
    }

    async fn step(&mut self) -> WatcherState {
        match self.state {
            WatcherState::Running => self.running().await,
            WatcherState::SoftShutdownRequested => self.soft_requested().await,
            WatcherState::HardShutdownRequested => {
                self.coordinator.hierarchy().hard().cancelled().await;
                WatcherState::Terminated
            }
            WatcherState::Terminated => WatcherState::Terminated,
        }
    }

    async fn running(&mut self) -> WatcherState {
        let coordinator = self.coordinator.clone();

        tokio::select! {
            biased;
            _ = coordinator.exiting().wait() => WatcherState::Terminated,
            _ = coordinator.hierarchy().soft().cancelled() => WatcherState::SoftShutdownRequested,
            received = self.signals.recv(), if self.signals_open => match received {
                Some(signal) => {
                    tracing::info!(signal = %signal, "received signal");
                    metrics::record_signal(signal.as_str());
                    coordinator.shutdown();
                    WatcherState::SoftShutdownRequested
                }
                None => {
                    tracing::warn!("Signal source closed, relying on programmatic shutdown");
                    self.signals_open = false;
                    WatcherState::Running
                }
            },
        }
    }

    async fn soft_requested(&mut self) -> WatcherState {
        let coordinator = self.coordinator.clone();
        let hierarchy = coordinator.hierarchy();

        let grace = time::sleep(GRACE_PERIOD);
        tokio::pin!(grace);

        loop {
            tokio::select! {
                biased;
                _ = coordinator.exiting().wait() => return WatcherState::Terminated,
                _ = hierarchy.hard().cancelled() => return WatcherState::Terminated,
                received = self.signals.recv(), if self.signals_open => match received {
                    Some(signal) => {
                        tracing::warn!(signal = %signal, "received signal, forcing shutdown");
                        metrics::record_signal(signal.as_str());
                        hierarchy.cancel_hard();
                        return WatcherState::HardShutdownRequested;
                    }
                    None => self.signals_open = false,
                },
                _ = &mut grace => {
                    tracing::warn!(grace_secs = GRACE_PERIOD.as_secs(), "timed out");
                    hierarchy.cancel_hard();
                    return WatcherState::HardShutdownRequested;
                }
            }
        }
    }
}
