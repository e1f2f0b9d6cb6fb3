#![allow(clippy::must_use_candidate)]

mod env;
mod loader;
pub mod service;
pub mod telemetry;

use serde::Deserialize;

pub use service::ServiceConfig;
pub use telemetry::TelemetryConfig;

/// Top-level Faultline configuration
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Identity and diagnostics of the service being wrapped
    #[serde(default)]
    pub service: ServiceConfig,
    /// Log output
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
