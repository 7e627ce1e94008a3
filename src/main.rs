//! Journal access engine.
//!
//! # Architecture Overview
//!
//! ```text
//!     Request ──▶ http (request id, trace, timeout)
//!                   │
//!                   ▼
//!             request context ──▶ casa verifier ──▶ nonce store
//!                   │
//!                   ▼
//!             subscription resolver ──▶ repository (deadline + retry)
//!                   │
//!                   ▼
//!             access decision (ticket → embargo → subscription)
//!                   │
//!     Response ◀────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use journal_access::casa::InMemoryNonceStore;
use journal_access::config::{load_config, ConfigWatcher, EngineConfig};
use journal_access::http::HttpServer;
use journal_access::lifecycle::{wait_for_signal, Shutdown};
use journal_access::observability::{logging, metrics};
use journal_access::subscription::InMemoryRepository;

#[derive(Parser)]
#[command(name = "journal-access")]
#[command(about = "Content access resolution engine for scholarly journals", long_about = None)]
struct Args {
    /// TOML configuration file, watched for changes
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON dataset, overrides `repository.data_path`
    #[arg(short, long)]
    data: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "journal-access starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        casa_enabled = config.casa.enabled,
        tickets_enabled = !config.tickets.key.is_empty(),
        trust_identity_headers = config.identity.trust_headers,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let repository = match args.data.as_ref().or(config.repository.data_path.as_ref()) {
        Some(path) => InMemoryRepository::load_from_file(path)?,
        None => {
            tracing::warn!("No dataset configured, serving an empty repository");
            InMemoryRepository::new()
        }
    };

    let shutdown = Shutdown::new();
    let nonces = InMemoryNonceStore::new();
    let sweeper = nonces.spawn_sweeper(Duration::from_secs(60), shutdown.subscribe());

    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (tokio::sync::mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let server = HttpServer::new(config, Arc::new(repository), Arc::new(nonces));
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    if !shutdown.drained(Duration::from_secs(5)).await {
        tracing::warn!(
            remaining = shutdown.receiver_count(),
            "Background tasks still running at drain deadline"
        );
        sweeper.abort();
    }
    let _ = sweeper.await;
    tracing::info!("Shutdown complete");
    Ok(())
}
