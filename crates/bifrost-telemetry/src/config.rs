//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging output.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error or a directive list)
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Network identifier (mainnet, testnet, mocknet)
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "bifrost".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            network: "testnet".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read `BIFROST_LOG_LEVEL` (or `RUST_LOG`), `BIFROST_CONSOLE_OUTPUT`,
    /// `BIFROST_JSON_LOGS` and `NET` from the process environment. JSON logs
    /// default on inside containers.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`TelemetryConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |name: &str| {
            lookup(name).map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"))
        };
        let in_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();
        let defaults = Self::default();
        Self {
            log_level: lookup("BIFROST_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            console_output: lookup("BIFROST_CONSOLE_OUTPUT")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0"))
                .unwrap_or(true),
            json_logs: flag("BIFROST_JSON_LOGS").unwrap_or(in_container),
            network: lookup("NET").unwrap_or(defaults.network),
            service_name: defaults.service_name,
        }
    }

    /// Override the log level (command line wins over environment).
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}
