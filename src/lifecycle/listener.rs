//! Contract between the shutdown coordinator and the request-serving worker.
//!
//! The coordinator only needs two things from a listener: a `serve` call that
//! returns once serving is over, and a way to ask it to stop accepting new
//! work while in-flight work drains until a deadline.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// Serving stopped because of an I/O failure.
    #[error("serve failed: {0}")]
    Serve(#[from] std::io::Error),
    /// The serving task panicked or was cancelled.
    #[error("listener task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A request-serving worker the coordinator must wait for.
pub trait ServiceListener: Send + 'static {
    /// Address the listener accepts connections on.
    fn local_addr(&self) -> Result<SocketAddr, ListenerError>;

    /// Serve until `stop` is requested and the drain finished (or its
    /// deadline passed), or until a fatal error. Runs as a registered worker.
    fn serve(self, stop: StopSignal) -> impl Future<Output = Result<(), ListenerError>> + Send;
}

/// Create a linked stop handle / stop signal pair.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(None);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

/// Coordinator side: asks the listener to stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<Option<CancellationToken>>>,
}

impl StopHandle {
    /// Stop accepting new connections. In-flight requests may finish until
    /// `deadline` is cancelled. Only the first request is recorded.
    pub fn stop(&self, deadline: CancellationToken) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(deadline);
            true
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Listener side: resolves when a stop was requested.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<Option<CancellationToken>>,
}

impl StopSignal {
    /// Wait for a stop request and return its drain deadline.
    ///
    /// Never resolves if the handle is dropped without stopping.
    pub async fn requested(&mut self) -> CancellationToken {
        loop {
            let current = self.rx.borrow_and_update().clone();
            if let Some(deadline) = current {
                return deadline;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
