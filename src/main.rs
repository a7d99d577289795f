//! Guild roster service.
//!
//! # Lifecycle
//!
//! ```text
//!   start ──▶ bind listener ──▶ probe database ──▶ spawn workers ──▶ serve
//!                                                  │                  │
//!                                    signal watcher ┤                  │ stop / failure
//!                                   liveness probe ┘                  ▼
//!                                                     cancel soft, listener drains
//!                                                                     │
//!                                                     6s for workers, else cancel hard
//!                                                                     │
//!                                                          3s more, else abandon
//!                                                                     ▼
//!                                                                   exit
//! ```
//!
//! First SIGINT/SIGTERM drains, a second one (or 5s without progress)
//! forces hard shutdown.

use clap::Parser;
use std::path::PathBuf;

use guildroster::config::{load_config, validate_config, ConfigError, ServerConfig};
use guildroster::lifecycle;
use guildroster::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "guildroster")]
#[command(version, about = "Guild roster HTTP service", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on: ip:port, hostname:port, or :port for all interfaces.
    #[arg(long)]
    bind: Option<String>,

    /// Database host:port probed for liveness.
    #[arg(long)]
    db: Option<String>,
}

impl Cli {
    fn resolve_config(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(db) = &self.db {
            config.database.address = db.clone();
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "guildroster starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        database = %config.database.address,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Err(e) = metrics::init_metrics(config.observability.metrics_address) {
            tracing::error!(error = %e, "Failed to start metrics exporter");
        }
    }

    let service = lifecycle::start(&config).await.map_err(|e| {
        tracing::error!(error = %e, "Startup failed");
        e
    })?;

    match service.run().await {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            tracing::error!(error = %e, "Listener failed, exiting");
            std::process::exit(1);
        }
    }
}
