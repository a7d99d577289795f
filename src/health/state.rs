//! Dependency health flag.
//!
//! # States
//! - Unknown: no probe has completed yet
//! - Healthy: last probe succeeded
//! - Unhealthy: last probe failed
//!
//! Single writer (the liveness worker, plus the startup probe), any number of
//! lock-free readers.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared tri-state health flag backed by a single atomic word.
#[derive(Debug, Clone, Default)]
pub struct HealthFlag {
    state: Arc<AtomicU8>,
}

impl HealthFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new state. Returns the previous one.
    pub fn set(&self, state: HealthState) -> HealthState {
        let previous = HealthState::from(self.state.swap(state as u8, Ordering::Release));
        if previous != state {
            tracing::info!(from = %previous, to = %state, "Dependency health changed");
        }
        previous
    }

    pub fn get(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }
}
