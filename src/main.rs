//! WolfStore CLI
//!
//! Command-line interface for running and initializing the object
//! storage server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfstore::{Config, FileStore, ObjectServer};

#[derive(Parser)]
#[command(name = "wolfstore")]
#[command(author = "Wolf Software Systems Ltd")]
#[command(version)]
#[command(about = "Filesystem-backed object storage server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/wolfstore/config.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the object storage server
    Serve {
        /// Bind address override
        #[arg(short, long)]
        bind: Option<String>,

        /// Storage root override
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Write a default configuration file and create the storage root
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    // Load config if it exists
    let mut config = if cli.config.exists() {
        Config::load(&cli.config)
            .with_context(|| format!("failed to load config {:?}", cli.config))?
    } else {
        info!("No config file found, using defaults");
        Config::default()
    };

    match cli.command {
        Commands::Serve { bind, root } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(root) = root {
                config.storage.root = root;
            }
            serve(config).await
        }

        Commands::Init => init(&cli.config, &config),
    }
}

/// Run the server until ctrl-c, then drain in-flight requests up to
/// the configured deadline
async fn serve(config: Config) -> anyhow::Result<()> {
    let store = FileStore::new(&config.storage.root)
        .with_context(|| format!("failed to open storage root {:?}", config.storage.root))?;
    info!("storage root: {:?}", store.root());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = ObjectServer::new(config.server.bind.clone(), store);
    let mut handle = tokio::spawn(server.run(async {
        shutdown_rx.await.ok();
    }));

    tokio::select! {
        result = &mut handle => {
            // Listener exited on its own (bind failure, fatal IO error)
            result.context("server task panicked")??;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    let _ = shutdown_tx.send(());

    let deadline = Duration::from_secs(config.server.shutdown_timeout_secs);
    match tokio::time::timeout(deadline, &mut handle).await {
        Ok(result) => {
            result.context("server task panicked")??;
        }
        Err(_) => {
            // Aborted stores only ever touch their temp files
            warn!(
                "shutdown deadline ({}s) exceeded, aborting in-flight requests",
                config.server.shutdown_timeout_secs
            );
            handle.abort();
        }
    }

    info!("wolfstore exited");
    Ok(())
}

/// Create the config file and storage root for a fresh install
fn init(config_path: &Path, config: &Config) -> anyhow::Result<()> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {parent:?}"))?;
    }
    config
        .save(config_path)
        .with_context(|| format!("failed to write {config_path:?}"))?;
    std::fs::create_dir_all(&config.storage.root)
        .with_context(|| format!("failed to create {:?}", config.storage.root))?;

    info!("wrote configuration to {:?}", config_path);
    info!("created storage root {:?}", config.storage.root);
    Ok(())
}
