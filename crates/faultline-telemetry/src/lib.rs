//! Log output for Faultline services
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a `fmt`
//! layer, human-readable or JSON depending on configuration.

use faultline_config::TelemetryConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global subscriber from configuration
///
/// An invalid filter directive falls back to `info` instead of failing.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init(config: &TelemetryConfig) -> anyhow::Result<()> {
    let filter = build_filter(&config.log_filter);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry
            .with(fmt_layer.json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))?;
    } else {
        registry
            .with(fmt_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))?;
    }

    tracing::debug!(filter = %config.log_filter, json = config.json, "telemetry initialized");

    Ok(())
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("invalid log filter `{directive}`, falling back to `info`: {e}");
        EnvFilter::new("info")
    })
}
