//! Vanish server binary.
//!
//! # Usage
//!
//! ```bash
//! # Everything in memory (development)
//! vanish-server --bind 0.0.0.0:8080
//!
//! # Durable storage with a stable URL signing secret (production)
//! vanish-server --bind 0.0.0.0:8080 --public-url https://drop.example \
//!     --data-dir /var/lib/vanish --signing-secret <64 hex chars>
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vanish_core::ServiceConfig;
use vanish_server::{
    Server, ServerRuntimeConfig, SystemEnv, parse_signing_secret, pointer_signer,
    storage::{FsObjectStore, MemoryDropStore, MemoryObjectStore, RedbDropStore},
};

/// Vanish ephemeral drop server
#[derive(Parser, Debug)]
#[command(name = "vanish-server")]
#[command(about = "Ephemeral secure content drops")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Public base URL used in temporary object URLs
    #[arg(long, default_value = "http://localhost:8080")]
    public_url: String,

    /// Directory for the database and file blobs (in-memory if omitted)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Hex-encoded 32-byte key for signing object URLs
    #[arg(long, env = "VANISH_SIGNING_SECRET", hide_env_values = true)]
    signing_secret: Option<String>,

    /// Seconds between expiry sweeps
    #[arg(long, default_value = "600")]
    sweep_interval_secs: u64,

    /// Seconds one sweep pass may run before it is logged as stuck
    #[arg(long, default_value = "60")]
    sweep_timeout_secs: u64,

    /// Per-request storage timeout in milliseconds
    #[arg(long, default_value = "5000")]
    request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Vanish server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        public_url: args.public_url,
        data_dir: args.data_dir,
        signing_secret: args.signing_secret.as_deref().map(parse_signing_secret).transpose()?,
        sweep_interval: Duration::from_secs(args.sweep_interval_secs),
        sweep_timeout: Duration::from_secs(args.sweep_timeout_secs),
        request_timeout: Duration::from_millis(args.request_timeout_ms),
        service: ServiceConfig::default(),
    };

    let env = SystemEnv::new();
    let signer = pointer_signer(&config, &env);

    match config.data_dir.clone() {
        Some(dir) => {
            tracing::info!("Storing drops under {}", dir.display());
            std::fs::create_dir_all(&dir)?;
            let store = RedbDropStore::open(dir.join("drops.redb"))?;
            let objects = FsObjectStore::open(dir.join("objects"), signer)?;
            Server::bind(config, env, store, objects).await?.run().await?;
        },
        None => {
            tracing::warn!("No data directory - drops are lost on restart");
            let objects = MemoryObjectStore::new(signer);
            Server::bind(config, env, MemoryDropStore::new(), objects).await?.run().await?;
        },
    }

    Ok(())
}
