//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     One probe → Healthy, or abort startup
//!
//! Active checks (active.rs):
//!     15s ticker
//!     → probe.rs (bounded, scoped to hard cancellation)
//!     → state.rs (Healthy / Unhealthy)
//!
//! Readers:
//!     /healthz handler, metrics gauge
//! ```
//!
//! # Design Decisions
//! - Probe failures are never fatal after startup; they only flip the flag
//! - The flag is a single atomic word: one writer, lock-free readers

pub mod active;
pub mod probe;
pub mod state;

pub use active::{LivenessWorker, PROBE_INTERVAL};
pub use probe::{scoped_probe, DependencyProbe, ProbeError, TcpProbe};
pub use state::{HealthFlag, HealthState};
