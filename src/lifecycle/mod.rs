//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Bind listener → Probe dependency → Register workers → Serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → soft shutdown (listener drains)
//!     second signal or 5s grace → hard shutdown
//!
//! Shutdown (shutdown.rs):
//!     Stop requested or serve returns → Cancel soft → Wait 6s for workers
//!     (draining listener included) → Cancel hard → Wait 3s → Exit
//!     Exiting is set when serve returns
//! ```
//!
//! # Design Decisions
//! - Two nested cancellation tokens (cancel.rs): soft stops new work,
//!   hard abandons in-flight work
//! - Workers hold a scoped registration (workers.rs); the join barrier
//!   fires once every registration is dropped
//! - All timeouts are fixed; the process always exits in bounded time

pub mod cancel;
pub mod exiting;
pub mod listener;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod workers;

pub use cancel::CancellationHierarchy;
pub use exiting::ExitingFlag;
pub use listener::{stop_channel, ListenerError, ServiceListener, StopHandle, StopSignal};
pub use shutdown::{ExitOutcome, ShutdownCoordinator, FINAL_DRAIN_BUDGET, FIRST_DRAIN_BUDGET};
pub use signals::{
    OsSignals, SignalSource, SignalWatcher, TerminationSignal, WatcherState, GRACE_PERIOD,
};
pub use startup::{start, start_with, Service, StartupError};
pub use workers::{WorkerGuard, WorkerRegistry};
