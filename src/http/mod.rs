//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → /healthz reads the dependency health flag
//!     → anything else is 404
//!
//! On stop:
//!     stop accepting → drain in-flight requests → return
//!     (in-flight requests are abandoned once the drain deadline fires)
//! ```

pub mod server;

pub use server::{AppState, HealthResponse, HttpServer};
