//! Programmatic configuration builder for integration tests

use faultline_config::{Config, ServiceConfig};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Name the service errors are attributed to
    pub fn with_service_name(mut self, name: &str) -> Self {
        self.config.service.name = name.to_owned();
        self
    }

    /// Log recovered panics with backtraces
    pub fn with_debug_mode(mut self) -> Self {
        self.config.service.debug_mode = true;
        self
    }

    /// Build the service section only
    pub fn service(self) -> ServiceConfig {
        self.config.service
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
