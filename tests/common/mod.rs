//! Shared utilities for lifecycle integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use guildroster::config::ServerConfig;
use guildroster::health::{DependencyProbe, ProbeError};
use guildroster::lifecycle::{ListenerError, ServiceListener, StopSignal};

/// Start a stand-in database that accepts and immediately drops connections.
pub async fn start_mock_database() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    (addr, handle)
}

/// An address nothing is listening on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config bound to an ephemeral local port, probing `database`.
pub fn local_config(database: SocketAddr) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.database.address = database.to_string();
    config.database.probe_timeout_secs = 1;
    config
}

/// How a [`FakeListener`] behaves once it has been asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// In-flight work finishes at once.
    Immediate,
    /// In-flight work never finishes; only the deadline ends the drain.
    UntilDeadline,
}

/// A listener that needs no sockets, for paused-clock tests.
#[derive(Debug, Clone, Copy)]
pub enum FakeListener {
    /// `serve` returns as soon as it is called.
    Returns,
    /// `serve` fails as soon as it is called.
    Fails,
    /// `serve` runs until stopped, then drains.
    UntilStopped(Drain),
}

impl ServiceListener for FakeListener {
    fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 0)))
    }

    async fn serve(self, mut stop: StopSignal) -> Result<(), ListenerError> {
        match self {
            FakeListener::Returns => Ok(()),
            FakeListener::Fails => {
                Err(ListenerError::Serve(std::io::Error::other("accept failed")))
            }
            FakeListener::UntilStopped(drain) => {
                let deadline = stop.requested().await;
                if drain == Drain::UntilDeadline {
                    deadline.cancelled().await;
                }
                Ok(())
            }
        }
    }
}

/// A probe with a fixed answer that counts its calls.
#[derive(Debug, Default)]
pub struct CountingProbe {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl CountingProbe {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DependencyProbe for CountingProbe {
    fn name(&self) -> &str {
        "counting"
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ProbeError::Timeout(Duration::from_secs(1)))
        } else {
            Ok(())
        }
    }
}
