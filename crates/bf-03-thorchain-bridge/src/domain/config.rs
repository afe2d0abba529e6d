//! Consensus client and HTTP retry configuration.

use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::BridgeError;

/// Exponential back-off parameters shared by every HTTP client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackOffConfig {
    /// First retry delay
    #[serde(with = "humantime_serde")]
    pub initial_interval: Duration,
    /// Jitter, as a fraction of the current interval
    pub randomization_factor: f64,
    /// Growth factor between retries
    pub multiplier: f64,
    /// Upper bound of a single delay
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,
    /// Give up after this much time in total
    #[serde(with = "humantime_serde")]
    pub max_elapsed_time: Duration,
}

impl Default for BackOffConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            randomization_factor: 0.5,
            multiplier: 1.5,
            max_interval: Duration::from_secs(3 * 60),
            max_elapsed_time: Duration::from_secs(168 * 60 * 60),
        }
    }
}

impl BackOffConfig {
    /// Millisecond delays for tests.
    pub fn for_testing() -> Self {
        Self {
            initial_interval: Duration::from_millis(1),
            randomization_factor: 0.0,
            multiplier: 1.0,
            max_interval: Duration::from_millis(5),
            max_elapsed_time: Duration::from_secs(5),
        }
    }

    /// Fresh back-off schedule.
    pub fn to_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            current_interval: self.initial_interval,
            randomization_factor: self.randomization_factor,
            multiplier: self.multiplier,
            max_interval: self.max_interval,
            max_elapsed_time: Some(self.max_elapsed_time),
            ..Default::default()
        }
    }
}

/// Consensus node connection and node key handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThorchainConfig {
    /// Consensus network id, part of every sign doc
    pub chain_id: String,
    /// `host:port` of the consensus REST endpoint
    pub chain_host: String,
    /// Folder holding `keys/<signer_name>.key`
    pub chain_home_folder: String,
    /// Node key name
    pub signer_name: String,
    /// Passphrase of the sealed node key; empty means a plain key file
    pub signer_passwd: String,
    /// Per-request deadline
    #[serde(with = "humantime_serde")]
    pub http_request_timeout: Duration,
    /// Attempts per request
    pub max_http_request_retry: u32,
    /// Retry schedule
    pub back_off: BackOffConfig,
}

impl Default for ThorchainConfig {
    fn default() -> Self {
        Self {
            chain_id: "thorchain".to_string(),
            chain_host: "localhost:1317".to_string(),
            chain_home_folder: "thorcli".to_string(),
            signer_name: String::new(),
            signer_passwd: String::new(),
            http_request_timeout: Duration::from_secs(30),
            max_http_request_retry: 10,
            back_off: BackOffConfig::default(),
        }
    }
}

impl ThorchainConfig {
    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.chain_id.is_empty() {
            return Err(BridgeError::InvalidConfig("chain id is empty".to_string()));
        }
        if self.chain_host.is_empty() {
            return Err(BridgeError::InvalidConfig("chain host is empty".to_string()));
        }
        if self.signer_name.is_empty() {
            return Err(BridgeError::InvalidConfig("signer name is empty".to_string()));
        }
        if self.max_http_request_retry == 0 {
            return Err(BridgeError::InvalidConfig(
                "max_http_request_retry must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ThorchainConfig::default();
        assert_eq!(config.chain_id, "thorchain");
        assert_eq!(config.chain_host, "localhost:1317");
        assert_eq!(config.back_off.max_interval, Duration::from_secs(180));
        // signer name is mandatory
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_signer() {
        let config = ThorchainConfig {
            signer_name: "bifrost".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_back_off_humantime() {
        let config: BackOffConfig =
            serde_json::from_str(r#"{"initial_interval":"250ms","max_elapsed_time":"1h"}"#)
                .unwrap();
        assert_eq!(config.initial_interval, Duration::from_millis(250));
        assert_eq!(config.max_elapsed_time, Duration::from_secs(3600));
        assert_eq!(config.multiplier, 1.5);
        let backoff = config.to_backoff();
        assert_eq!(backoff.current_interval, Duration::from_millis(250));
    }
}
