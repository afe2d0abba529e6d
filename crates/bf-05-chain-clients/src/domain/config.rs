//! Per-chain configuration (`chains[]`).

use bf_01_block_scanner::BlockScannerConfig;
use bf_03_thorchain_bridge::{BackOffConfig, RetryingHttpClient};
use serde::{Deserialize, Serialize};
use shared_types::Chain;

use crate::ChainClientError;

/// Settings for one external chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfiguration {
    /// Adapter selector
    pub chain_id: Chain,
    /// RPC endpoint, `host:port` or a full URL
    pub rpc_host: String,
    /// Basic auth user; empty disables auth
    pub username: String,
    /// Basic auth password
    pub password: String,
    /// JSON-RPC over HTTP POST. bitcoind is only reachable this way.
    pub http_post_mode: bool,
    /// Use `http` instead of `https` when `rpc_host` has no scheme
    pub disable_tls: bool,
    /// Keep scanning and signing but stop creating vaults on this chain
    pub opt_to_retire: bool,
    /// RPC retry schedule
    pub back_off: BackOffConfig,
    /// Scanner settings for this chain
    pub block_scanner: BlockScannerConfig,
}

impl Default for ChainConfiguration {
    fn default() -> Self {
        Self {
            chain_id: Chain::bnb(),
            rpc_host: "localhost:26657".to_string(),
            username: String::new(),
            password: String::new(),
            http_post_mode: true,
            disable_tls: true,
            opt_to_retire: false,
            back_off: BackOffConfig::default(),
            block_scanner: BlockScannerConfig::for_chain(Chain::bnb()),
        }
    }
}

impl ChainConfiguration {
    /// Defaults for `chain` talking to `rpc_host`.
    pub fn new(chain: Chain, rpc_host: impl Into<String>) -> Self {
        Self {
            block_scanner: BlockScannerConfig::for_chain(chain.clone()),
            chain_id: chain,
            rpc_host: rpc_host.into(),
            ..Default::default()
        }
    }

    /// Reject settings no adapter can run with.
    pub fn validate(&self) -> Result<(), ChainClientError> {
        if self.rpc_host.trim().is_empty() {
            return Err(ChainClientError::InvalidConfig(format!(
                "{}: rpc_host must be set",
                self.chain_id
            )));
        }
        if self.chain_id == Chain::btc() && !self.http_post_mode {
            return Err(ChainClientError::InvalidConfig(
                "BTC: http_post_mode must be enabled for bitcoind".to_string(),
            ));
        }
        self.scanner_config()
            .validate()
            .map_err(|e| ChainClientError::InvalidConfig(format!("{}: {e}", self.chain_id)))
    }

    /// Scanner settings with the chain tag forced to `chain_id`.
    pub fn scanner_config(&self) -> BlockScannerConfig {
        BlockScannerConfig {
            chain_id: self.chain_id.clone(),
            ..self.block_scanner.clone()
        }
    }

    /// `rpc_host` with a scheme, without trailing slash.
    pub fn base_url(&self) -> String {
        let host = self.rpc_host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            return host.to_string();
        }
        let scheme = if self.disable_tls { "http" } else { "https" };
        format!("{scheme}://{host}")
    }

    /// Retrying client for the chain RPC, with basic auth when configured.
    pub fn http_client(&self) -> Result<RetryingHttpClient, ChainClientError> {
        let client = RetryingHttpClient::new(
            self.base_url(),
            self.block_scanner.http_request_timeout,
            self.back_off.clone(),
            self.block_scanner.max_http_request_retry,
        )?;
        Ok(client.with_basic_auth(&self.username, &self.password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_scheme() {
        let mut config = ChainConfiguration::new(Chain::btc(), "localhost:18443");
        assert_eq!(config.base_url(), "http://localhost:18443");
        config.disable_tls = false;
        assert_eq!(config.base_url(), "https://localhost:18443");
        config.rpc_host = "http://node:8545/".to_string();
        assert_eq!(config.base_url(), "http://node:8545");
    }

    #[test]
    fn test_validate() {
        assert!(ChainConfiguration::default().validate().is_ok());

        let mut config = ChainConfiguration::new(Chain::btc(), "");
        assert!(config.validate().is_err());
        config.rpc_host = "localhost:18443".to_string();
        config.http_post_mode = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scanner_config_takes_chain() {
        let config = ChainConfiguration::new(Chain::eth(), "localhost:8545");
        assert_eq!(config.scanner_config().chain_id, Chain::eth());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ChainConfiguration = serde_json::from_str(
            r#"{"chain_id":"ETH","rpc_host":"geth:8545","opt_to_retire":true,
                "block_scanner":{"start_block_height":7}}"#,
        )
        .unwrap();
        assert_eq!(config.chain_id, Chain::eth());
        assert!(config.opt_to_retire);
        assert!(config.http_post_mode);
        assert_eq!(config.block_scanner.start_block_height, 7);
        assert_eq!(config.scanner_config().chain_id, Chain::eth());
    }
}
