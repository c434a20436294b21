use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use viewlog::config::{self, Config};
use viewlog::logging::{self, Logger};
use viewlog::server;

/// Write sample errors to a rotating log and serve the log directory over HTTP
#[derive(Parser)]
#[command(name = "viewlog")]
#[command(version)]
#[command(about = "Leveled file logger with a browsable log directory")]
struct Cli {
    /// Port to serve on
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// The directory of static files to host
    #[arg(short = 'd', long = "dir")]
    dir: Option<PathBuf>,

    /// Config file (default: ~/.viewlog/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between sample records
    #[arg(long)]
    interval: Option<u64>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.dir {
            config.server.directory = dir.clone();
        }
        if let Some(interval) = self.interval {
            config.demo.interval_secs = interval;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_diagnostics(cli.verbose)?;

    let config = cli.resolve_config()?;
    config::ensure_log_directory(&config.logger)?;

    let handle = server::start(config.server.port, config.server.directory.clone())
        .await
        .context("Log server could not start")?;

    let logger = Arc::new(Logger::from_config(&config.logger));
    tracing::info!(
        "Logging to {} (view: {})",
        logger.file_path().display(),
        logger.rotator().view_path().display()
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(config.demo.interval_secs.max(1)));
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let logger = Arc::clone(&logger);
                let message = config.demo.message.clone();
                tokio::task::spawn_blocking(move || logger.error(&[&message]))
                    .await
                    .context("Sample writer task failed")?;
            }
            _ = &mut interrupted => {
                tracing::info!("Interrupted, stopping");
                break;
            }
        }
    }

    handle.shutdown()
}
