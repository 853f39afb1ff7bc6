//! # Marquee Daemon
//!
//! Runs the digest engine against one media server and logs what changes.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        marquee run                                      │
//! │                                                                         │
//! │  load config ──► build engine ──► spawn ──► start ──► wait for signal  │
//! │  (TOML + env)    (cache.json)                              │            │
//! │                                                            ▼            │
//! │                                             shutdown: stop, remove      │
//! │                                             listeners, end task         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cli;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use marquee_digest::{sign_in, DigestEngine, DigestError, MarqueeConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, Credentials, InitArgs, RunArgs};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Init(args)) => init(args, cli.config).await,
        Some(Command::Run(args)) => run(args, cli.config).await,
        None => run(RunArgs::default(), cli.config).await,
    }
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=marquee_digest=trace` - Trace the engine only
/// - Default: `info,marquee=debug`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,marquee=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = match MarqueeConfig::load(config_path) {
        Ok(config) => config,
        Err(DigestError::MissingToken) => {
            anyhow::bail!("No auth token configured. Run `marquee init` first.")
        }
        Err(err) => return Err(err).context("Failed to load configuration"),
    };

    info!(
        server = %config.server.base_url()?,
        refresh_minutes = config.digest.refresh_minutes,
        cache = %config.cache_path().display(),
        "Configuration loaded"
    );

    let handle = DigestEngine::builder()
        .config(config)
        .build()
        .await
        .context("Failed to build digest engine")?
        .spawn();

    if args.once {
        let result = handle.run_cycle().await;
        handle.shutdown().await?;
        return result.context("Digest failed");
    }

    handle.start().await?;
    info!("Digest engine started");

    shutdown_signal().await;

    if let Err(err) = handle.shutdown().await {
        warn!(error = %err, "Engine already stopped");
    }
    info!("Shutdown complete");
    Ok(())
}

async fn init(args: InitArgs, config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path
        .or_else(MarqueeConfig::default_config_path)
        .context("No config path available, pass --config")?;

    if path.exists() && !args.force {
        anyhow::bail!("{} already exists, pass --force to overwrite", path.display());
    }

    let mut config = args.to_config();
    let token = match args.credentials()? {
        Credentials::Token(token) => token,
        Credentials::SignIn { username, password } => {
            sign_in(&config.client, &username, &password)
                .await
                .context("plex.tv sign-in failed")?
        }
    };
    config.server.token = Some(token);
    config.validate_for_setup()?;

    let saved = config.save(Some(path))?;
    info!(path = %saved.display(), server = %config.server.base_url()?, "Config written");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
