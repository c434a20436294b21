//! Reporting channel for the logger's own failures
//!
//! Write and rotation failures are emitted as `tracing` events. The binary routes
//! them to stderr through a fmt layer filtered by `RUST_LOG`.

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter directive for a `-v` count
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "viewlog=info",
        1 => "viewlog=debug,tower_http=debug",
        _ => "viewlog=trace,axum=debug",
    }
}

/// Install the stderr subscriber
///
/// `RUST_LOG` takes precedence over the verbosity-derived filter.
pub fn init_diagnostics(verbosity: u8) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install diagnostics subscriber: {}", e))
}
