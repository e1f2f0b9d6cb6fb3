use serde::Deserialize;

/// Settings of the service whose requests are intercepted
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Reported as the `domain` of every `ErrorInfo` record
    #[serde(default = "default_name")]
    pub name: String,
    /// Log a backtrace alongside recovered panics
    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            debug_mode: false,
        }
    }
}

fn default_name() -> String {
    "faultline".to_string()
}
