//! Signing Ledger Daemon
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (port 3000, JWT_SECRET from env)
//! JWT_SECRET=... signing-ledger
//!
//! # Start with custom config
//! signing-ledger --config /path/to/config.toml
//!
//! # Start with custom port and storage directory
//! signing-ledger --http-port 3001 --storage-dir /data/signing
//! ```
//!
//! ## HTTP API
//!
//! - `GET /health` - Health check
//! - `POST /signature` - Sign a question/answer bundle
//! - `GET /signature/{id}` - Fetch answers of an owned signature

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use signing_ledger::{Config, HttpServer, JwtValidator, Services, SigningDb};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "signing-ledger")]
#[command(about = "Atomic question/answer signing service")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the SQLite database
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long)]
    http_port: Option<u16>,

    /// HMAC secret used to verify bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("signing_ledger=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(secret) = args.jwt_secret {
        config.jwt_secret = Some(secret);
    }

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        "Starting signing-ledger"
    );

    tokio::fs::create_dir_all(&config.storage_dir).await?;

    let config_path = config.config_path();
    if !config_path.exists() {
        // Secrets stay out of the generated file
        let defaults = Config {
            jwt_secret: None,
            ..config.clone()
        };
        defaults.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let jwt = JwtValidator::new(config.jwt_secret.clone().unwrap_or_default())
        .context("Set JWT_SECRET or --jwt-secret")?;

    let db = Arc::new(SigningDb::from_config(&config)?);
    let services = Arc::new(Services::new(db.clone()));

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let server = Arc::new(HttpServer::new(services, db, jwt, http_addr));

    info!("HTTP API available at http://{}", http_addr);
    info!("Endpoints:");
    info!("  GET  /health            - Health check");
    info!("  POST /signature         - Sign question/answer bundle");
    info!("  GET  /signature/{{id}}    - Fetch owned signature");

    server.run().await?;

    Ok(())
}
