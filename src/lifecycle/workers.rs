//! Background worker registration and join barrier.
//!
//! # Responsibilities
//! - Count workers that must finish before a clean exit
//! - Release each worker exactly once, on every exit path
//! - Expose a single "all workers finished" completion signal
//!
//! # Design Decisions
//! - Built on `TaskTracker`: a `WorkerGuard` holds a tracker token, so
//!   dropping the guard (return, early return or unwind) is the release
//! - The barrier only fires after `seal()`, so it cannot fire between
//!   process start and the first registration

use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::task::{task_tracker::TaskTrackerToken, TaskTracker};

/// Join barrier for registered background workers.
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    tracker: TaskTracker,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Register a worker. Must be called before the worker starts.
    ///
    /// The returned guard must live as long as the worker; dropping it marks
    /// the worker as done.
    pub fn register(&self, name: &'static str) -> WorkerGuard {
        let token = self.tracker.token();
        tracing::debug!(worker = name, pending = self.tracker.len(), "Worker registered");
        WorkerGuard { name, _token: token }
    }

    /// Register a worker and spawn it on the current runtime.
    pub fn spawn<F>(&self, name: &'static str, worker: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.register(name);
        tokio::spawn(async move {
            let _guard = guard;
            worker.await
        })
    }

    /// End the registration phase. Returns `false` if already sealed.
    pub fn seal(&self) -> bool {
        self.tracker.close()
    }

    /// Number of workers that have not yet finished.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Whether the barrier has already fired.
    pub fn is_all_done(&self) -> bool {
        self.tracker.is_closed() && self.tracker.is_empty()
    }

    /// Resolve once the registry is sealed and every worker has finished.
    pub async fn all_done(&self) {
        self.tracker.wait().await
    }
}

/// Scoped registration of a single worker.
#[derive(Debug)]
pub struct WorkerGuard {
    name: &'static str,
    _token: TaskTrackerToken,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        tracing::debug!(worker = self.name, "Worker finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn fired(registry: &WorkerRegistry) -> bool {
        tokio::time::timeout(Duration::from_millis(20), registry.all_done())
            .await
            .is_ok()
    }

    #[tokio::test]
    async fn zero_workers_fire_on_seal() {
        let registry = WorkerRegistry::new();
        assert!(!fired(&registry).await);
        assert!(registry.seal());
        assert!(fired(&registry).await);
        assert!(registry.is_all_done());
    }

    #[tokio::test]
    async fn fires_only_after_last_release() {
        let registry = WorkerRegistry::new();
        let mut guards: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| registry.register(name))
            .collect();
        registry.seal();
        assert_eq!(registry.pending(), 3);

        while guards.len() > 1 {
            guards.pop();
            assert!(!fired(&registry).await);
        }
        assert_eq!(registry.pending(), 1);

        guards.pop();
        assert!(fired(&registry).await);
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test]
    async fn repeated_reads_after_firing() {
        let registry = WorkerRegistry::new();
        drop(registry.register("once"));
        registry.seal();
        for _ in 0..3 {
            assert!(fired(&registry).await);
        }
        assert!(!registry.seal());
    }

    #[tokio::test]
    async fn spawned_worker_released_on_panic() {
        let registry = WorkerRegistry::new();
        let handle = registry.spawn("panicky", async {
            panic!("worker failure");
        });
        registry.seal();

        assert!(handle.await.is_err());
        assert!(fired(&registry).await);
    }

    #[tokio::test]
    async fn spawned_worker_released_on_return() {
        let registry = WorkerRegistry::new();
        let handle = registry.spawn("short", async { 7 });
        registry.seal();

        assert_eq!(handle.await.unwrap(), 7);
        assert!(fired(&registry).await);
    }
}
