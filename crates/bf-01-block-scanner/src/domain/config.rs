//! Block scanner configuration.

use serde::{Deserialize, Serialize};
use shared_types::Chain;
use std::time::Duration;

use crate::ScannerError;

/// Settings for one scanner instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockScannerConfig {
    /// Chain being scanned
    pub chain_id: Chain,
    /// Directory of the scanner store
    pub db_path: String,
    /// 0 discovers the start height, anything else is used as the scan position
    pub start_block_height: i64,
    /// Capacity of the outbound block queue
    pub block_scan_processors: usize,
    /// Per-RPC deadline
    #[serde(with = "humantime_serde")]
    pub http_request_timeout: Duration,
    /// Read deadline for RPC responses
    #[serde(with = "humantime_serde")]
    pub http_request_read_timeout: Duration,
    /// Write deadline for RPC requests
    #[serde(with = "humantime_serde")]
    pub http_request_write_timeout: Duration,
    /// RPC retry ceiling
    pub max_http_request_retry: u32,
    /// Sleep after "not yet produced" or a failed fetch
    #[serde(with = "humantime_serde")]
    pub block_height_discover_back_off: Duration,
    /// Retry loop tick
    #[serde(with = "humantime_serde")]
    pub block_retry_interval: Duration,
}

impl Default for BlockScannerConfig {
    fn default() -> Self {
        Self {
            chain_id: Chain::default(),
            db_path: "observer_data".to_string(),
            start_block_height: 0,
            block_scan_processors: 2,
            http_request_timeout: Duration::from_secs(30),
            http_request_read_timeout: Duration::from_secs(30),
            http_request_write_timeout: Duration::from_secs(30),
            max_http_request_retry: 10,
            block_height_discover_back_off: Duration::from_secs(1),
            block_retry_interval: Duration::from_secs(1),
        }
    }
}

impl BlockScannerConfig {
    /// Default settings for `chain`.
    pub fn for_chain(chain: Chain) -> Self {
        Self {
            chain_id: chain,
            ..Default::default()
        }
    }

    /// Fast timings for tests.
    pub fn for_testing(chain: Chain) -> Self {
        Self {
            chain_id: chain,
            block_height_discover_back_off: Duration::from_millis(10),
            block_retry_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    /// Reject settings the scanner cannot run with.
    pub fn validate(&self) -> Result<(), ScannerError> {
        if self.start_block_height < 0 {
            return Err(ScannerError::InvalidConfig(format!(
                "start_block_height must not be negative, got {}",
                self.start_block_height
            )));
        }
        if self.block_scan_processors == 0 {
            return Err(ScannerError::InvalidConfig(
                "block_scan_processors must be at least 1".to_string(),
            ));
        }
        if self.block_height_discover_back_off.is_zero() || self.block_retry_interval.is_zero() {
            return Err(ScannerError::InvalidConfig(
                "block_height_discover_back_off and block_retry_interval must be non-zero"
                    .to_string(),
            ));
        }
        if self.http_request_timeout.is_zero() {
            return Err(ScannerError::InvalidConfig(
                "http_request_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
