//! Dependency probes.
//!
//! # Responsibilities
//! - Define the bounded-time health check the liveness worker runs
//! - Provide a TCP reachability probe for the database dependency
//! - Scope every probe to a cancellation token so a hanging dependency
//!   never outlives hard shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::DatabaseConfig;

/// Why a probe did not succeed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("probe abandoned: shutdown in progress")]
    Cancelled,
}

/// A bounded-time health check of an external dependency.
pub trait DependencyProbe: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn probe(&self) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

impl<P: DependencyProbe> DependencyProbe for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn probe(&self) -> impl Future<Output = Result<(), ProbeError>> + Send {
        (**self).probe()
    }
}

/// Run `probe`, giving up as soon as `scope` is cancelled.
pub async fn scoped_probe<P>(probe: &P, scope: &CancellationToken) -> Result<(), ProbeError>
where
    P: DependencyProbe + ?Sized,
{
    tokio::select! {
        biased;
        _ = scope.cancelled() => Err(ProbeError::Cancelled),
        result = probe.probe() => result,
    }
}

/// Checks that the database accepts TCP connections.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(
            config.address.clone(),
            Duration::from_secs(config.probe_timeout_secs),
        )
    }
}

impl DependencyProbe for TcpProbe {
    fn name(&self) -> &str {
        &self.addr
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        match time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(source)) => Err(ProbeError::Connect {
                addr: self.addr.clone(),
                source,
            }),
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}
