//! # Bifrost Configuration
//!
//! One TOML document, every section optional:
//!
//! ```toml
//! [thorchain]
//! chain_host = "localhost:1317"
//! signer_name = "bifrost"
//!
//! [metrics]
//! listen_port = 9000
//!
//! [signer]
//! retry_interval = "2s"
//!
//! [[chains]]
//! chain_id = "BNB"
//! rpc_host = "localhost:26657"
//! ```
//!
//! Environment overrides are applied after the file is read.

use bf_03_thorchain_bridge::ThorchainConfig;
use bf_04_tss::TssConfig;
use bf_05_chain_clients::ChainConfiguration;
use bf_07_signer::SignerConfig;
use bifrost_telemetry::MetricsServerConfig;
use serde::{Deserialize, Serialize};
use shared_types::{Chain, ChainNetwork};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {path}: {message}")]
    Io {
        /// Config path
        path: String,
        /// OS message
        message: String,
    },

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },

    /// A section failed validation.
    #[error("Invalid {section} configuration: {message}")]
    Invalid {
        /// Section name
        section: String,
        /// Validation message
        message: String,
    },
}

impl ConfigError {
    fn invalid(section: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ConfigError::Invalid {
            section: section.into(),
            message: err.to_string(),
        }
    }
}

/// `/metrics` listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `/metrics` at all
    pub enabled: bool,
    /// Port bound on all interfaces
    pub listen_port: u16,
    /// Request read deadline
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Response write deadline
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_port: 9000,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl MetricsConfig {
    /// Listener settings for the telemetry server.
    pub fn server_config(&self) -> MetricsServerConfig {
        MetricsServerConfig {
            listen_port: self.listen_port,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        }
    }
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BifrostConfig {
    /// Address flavour; `NET` overrides it
    pub network: ChainNetwork,
    /// Consensus node and node key
    pub thorchain: ThorchainConfig,
    /// Prometheus endpoint
    pub metrics: MetricsConfig,
    /// Signing side
    pub signer: SignerConfig,
    /// Threshold service
    pub tss: TssConfig,
    /// External chains
    pub chains: Vec<ChainConfiguration>,
}

impl BifrostConfig {
    /// Read `path`, or use the defaults when `None`, then apply the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `BIFROST_CHAIN_HOST`, `BIFROST_SIGNER_NAME`,
    /// `BIFROST_SIGNER_PASSWD`, `BIFROST_METRICS_PORT` and `NET` as seen
    /// through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("BIFROST_CHAIN_HOST") {
            self.thorchain.chain_host = host;
        }
        if let Some(name) = lookup("BIFROST_SIGNER_NAME") {
            self.thorchain.signer_name = name;
        }
        if let Some(passwd) = lookup("BIFROST_SIGNER_PASSWD") {
            self.thorchain.signer_passwd = passwd;
        }
        if let Some(port) = lookup("BIFROST_METRICS_PORT") {
            self.metrics.listen_port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "BIFROST_METRICS_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(net) = lookup("NET") {
            self.network = net.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "NET",
                value: net.clone(),
            })?;
        }
        Ok(())
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thorchain
            .validate()
            .map_err(|e| ConfigError::invalid("thorchain", e))?;
        self.tss.validate().map_err(|e| ConfigError::invalid("tss", e))?;
        self.signer
            .validate()
            .map_err(|e| ConfigError::invalid("signer", e))?;
        if self.metrics.enabled && self.metrics.listen_port == 0 {
            return Err(ConfigError::invalid("metrics", "listen_port must be set"));
        }
        for chain in &self.chains {
            chain
                .validate()
                .map_err(|e| ConfigError::invalid(format!("chains.{}", chain.chain_id), e))?;
        }
        Ok(())
    }

    /// Chains reported for new vaults: every configured chain that has not
    /// opted to retire.
    pub fn keygen_chains(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = self
            .chains
            .iter()
            .filter(|c| !c.opt_to_retire)
            .map(|c| c.chain_id.clone())
            .collect();
        chains.sort();
        chains.dedup();
        chains
    }
}
