//! Watchlog Compaction Daemon
//!
//! The `watchlogd` binary runs the watch-history compaction scheduler:
//! - Loads configuration from a TOML file and the command line
//! - Pings the store and starts periodic sweeps
//! - Drains in-flight migrations on SIGTERM/SIGINT
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings
//! watchlogd
//!
//! # Use configuration file
//! watchlogd --config /etc/watchlog/watchlogd.toml
//!
//! # Override the age limit and pool size
//! watchlogd --age-limit-hours 24 --worker-pool-size 16
//!
//! # Print the CQL schema and exit
//! watchlogd --print-schema
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use watchlog_server::config::ServerConfig;
use watchlog_server::daemon;

/// Watchlog Compaction Daemon
#[derive(Parser, Debug)]
#[command(
    name = "watchlogd",
    author = "Watchlog Team",
    version,
    about = "Watch-history compaction daemon",
    long_about = "Moves aged watch ticks from the staging table into canonical \
                  watch history and the recently-watched index."
)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE", env = "WATCHLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Store contact points (comma separated). This build only ships the
    /// in-memory store, so setting hosts fails at startup.
    #[arg(long, value_delimiter = ',', env = "WATCHLOG_STORE_HOSTS")]
    hosts: Vec<String>,

    /// Keyspace holding the watch-history tables
    #[arg(long, env = "WATCHLOG_KEYSPACE")]
    keyspace: Option<String>,

    /// Number of concurrent migration workers
    #[arg(long, env = "WATCHLOG_WORKER_POOL_SIZE")]
    worker_pool_size: Option<usize>,

    /// Seconds between sweeps (at least 10)
    #[arg(long, env = "WATCHLOG_SWEEP_COOLDOWN_SECONDS")]
    sweep_cooldown_seconds: Option<u64>,

    /// Age in hours a watch tick must exceed before it is migrated
    #[arg(long, env = "WATCHLOG_AGE_LIMIT_HOURS")]
    age_limit_hours: Option<u64>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "WATCHLOG_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Print the CQL schema and exit
    #[arg(long)]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;

    // Initialize logging
    init_logging(&args, &config);

    // Print config and exit if requested
    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    if args.print_schema {
        for statement in daemon::schema_ddl(&config.store)? {
            println!("{statement}\n");
        }
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;

    info!("watchlogd v{}", env!("CARGO_PKG_VERSION"));
    let store = daemon::open_store(&config.store)?;
    daemon::run(config, store, shutdown_signal()).await
}

fn init_logging(args: &Args, config: &ServerConfig) {
    let level = if args.verbose {
        "debug"
    } else {
        &config.log_level
    };

    let filter = EnvFilter::try_new(format!(
        "watchlogd={level},watchlog_server={level},watchlog_compaction={level},watchlog_store={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    // Start with defaults
    let mut config = if let Some(path) = &args.config {
        ServerConfig::from_file(path).context("Failed to load config file")?
    } else {
        ServerConfig::default()
    };

    // Override with command-line arguments
    if !args.hosts.is_empty() {
        config.store.hosts = args.hosts.clone();
    }
    if let Some(keyspace) = &args.keyspace {
        config.store.keyspace = keyspace.clone();
    }
    if let Some(size) = args.worker_pool_size {
        config.compaction.worker_pool_size = size;
    }
    if let Some(secs) = args.sweep_cooldown_seconds {
        config.compaction.sweep_cooldown_seconds = secs;
    }
    if let Some(hours) = args.age_limit_hours {
        config.compaction.age_limit_hours = hours;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
