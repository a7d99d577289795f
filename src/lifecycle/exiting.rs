//! One-shot "process is exiting" broadcast.

use tokio::sync::watch;

/// Closed-once flag set the moment the listener stops serving.
///
/// Backed by a watch channel so any number of tasks can wait on it, and
/// late subscribers observe the final value immediately.
#[derive(Debug)]
pub struct ExitingFlag {
    tx: watch::Sender<bool>,
}

impl ExitingFlag {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Set the flag. Returns `true` only for the call that actually set it.
    pub fn set(&self) -> bool {
        self.tx.send_if_modified(|exiting| {
            if *exiting {
                false
            } else {
                *exiting = true;
                true
            }
        })
    }

    /// Non-blocking read.
    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the flag is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|exiting| *exiting).await;
    }
}

impl Default for ExitingFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn set_once() {
        let flag = ExitingFlag::new();
        assert!(!flag.is_set());
        assert!(flag.set());
        assert!(!flag.set());
        assert!(flag.is_set());
    }

    #[tokio::test]
    async fn wait_after_set_is_immediate() {
        let flag = ExitingFlag::new();
        flag.set();
        tokio::time::timeout(Duration::from_millis(50), flag.wait())
            .await
            .expect("wait should resolve immediately");
    }

    #[tokio::test]
    async fn releases_every_waiter() {
        let flag = Arc::new(ExitingFlag::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let flag = flag.clone();
                tokio::spawn(async move { flag.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        flag.set();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter should be released")
                .unwrap();
        }
    }
}
