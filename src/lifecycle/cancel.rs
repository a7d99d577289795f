//! Two-level cancellation hierarchy.
//!
//! # Tokens
//! - `hard` (root): abandon in-flight work immediately
//! - `soft` (child of `hard`): stop accepting new work, finish in-flight work
//!
//! Cancelling `hard` is always observable through `soft`; cancelling `soft`
//! never reaches `hard`.

use tokio_util::sync::CancellationToken;

/// Soft and hard cancellation tokens shared by every worker.
#[derive(Debug, Clone)]
pub struct CancellationHierarchy {
    hard: CancellationToken,
    soft: CancellationToken,
}

impl CancellationHierarchy {
    /// Create a fresh hierarchy with neither token cancelled.
    pub fn new() -> Self {
        let hard = CancellationToken::new();
        let soft = hard.child_token();
        Self { hard, soft }
    }

    /// Request soft shutdown. Only the first call has any effect.
    pub fn cancel_soft(&self) {
        if !self.soft.is_cancelled() {
            tracing::debug!("Soft cancellation requested");
        }
        self.soft.cancel();
    }

    /// Request hard shutdown. Also marks the soft token as cancelled.
    pub fn cancel_hard(&self) {
        if !self.hard.is_cancelled() {
            tracing::debug!("Hard cancellation requested");
        }
        self.hard.cancel();
    }

    /// Token released on soft (or hard) cancellation.
    pub fn soft(&self) -> &CancellationToken {
        &self.soft
    }

    /// Token released on hard cancellation only.
    pub fn hard(&self) -> &CancellationToken {
        &self.hard
    }

    pub fn is_soft_cancelled(&self) -> bool {
        self.soft.is_cancelled()
    }

    pub fn is_hard_cancelled(&self) -> bool {
        self.hard.is_cancelled()
    }
}

impl Default for CancellationHierarchy {
    fn default() -> Self {
        Self::new()
    }
}
