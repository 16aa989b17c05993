//! Photo intake service.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                    PHOTO INTAKE                       │
//!                     │                                                       │
//!   POST /upload      │  ┌──────────┐   ┌───────────┐   ┌──────────────────┐  │
//!   ──────────────────┼─▶│ throttle │──▶│ multipart │──▶│ admission filter │  │
//!                     │  │ (per IP) │   │  decoder  │   │  (declared MIME) │  │
//!                     │  └──────────┘   └───────────┘   └────────┬─────────┘  │
//!                     │                                          │            │
//!                     │                                          ▼            │
//!                     │  ┌──────────┐   ┌───────────┐   ┌──────────────────┐  │
//!   ◀─────────────────┼──│ response │◀──│  storage  │◀──│  name sanitizer  │  │
//!   status + message  │  │ encoder  │   │  writer   │   │ (token + clean)  │  │
//!                     │  └──────────┘   └─────┬─────┘   └──────────────────┘  │
//!                     │                       ▼                               │
//!                     │                  upload_dir/                          │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use photo_intake::config::{load_config, watcher::ConfigWatcher, IntakeConfig};
use photo_intake::lifecycle::{ensure_upload_dir, Shutdown};
use photo_intake::observability::{logging, metrics};
use photo_intake::HttpServer;

#[derive(Parser)]
#[command(name = "photo-intake")]
#[command(about = "Single-endpoint photo upload service", long_about = None)]
struct Args {
    /// TOML configuration file. Watched for changes when given.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => load_config(path)?,
        None => IntakeConfig::default(),
    };
    let mut config = file_config.clone();
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("photo-intake v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upload_dir = %config.upload.upload_dir,
        max_upload_bytes = config.upload.max_upload_bytes,
        allowed_mime_types = ?config.upload.allowed_mime_types,
        rate_limit_enabled = config.rate_limit.enabled,
        "Configuration loaded"
    );

    ensure_upload_dir(Path::new(&config.upload.upload_dir))?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the life of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, file_config);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
