//! keeld - Keel convergence daemon
//!
//! Runs the HostedService and LicensedServer controllers against an
//! in-memory store seeded from manifests, with a small REST API on top.

use clap::Parser;
use keel_daemon::config::MANIFESTS_DIR_ENV;
use keel_daemon::{logging, Daemon, DaemonConfig};
use std::path::PathBuf;

/// Keel daemon CLI
#[derive(Parser)]
#[command(name = "keeld")]
#[command(about = "Keel - convergence engine for hosted and licensed servers", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "KEEL_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "KEEL_LISTEN_ADDR")]
    listen: Option<String>,

    /// Directory of YAML manifests applied at startup
    #[arg(short, long, env = MANIFESTS_DIR_ENV)]
    manifests: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "KEEL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "KEEL_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = DaemonConfig::load(cli.config.as_deref())?;

    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {listen}: {e}"))?;
    }
    if let Some(dir) = cli.manifests {
        config.manifests.dir = Some(dir);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    logging::init(&config.logging.level, config.logging.json)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        api = config.server.api_enabled,
        "Starting keeld"
    );

    Daemon::new(config).run().await?;
    Ok(())
}
