//! Signer configuration.

use bf_01_block_scanner::BlockScannerConfig;
use serde::{Deserialize, Serialize};
use shared_types::Chain;
use std::time::Duration;

use crate::SignerError;

/// Settings of the signing side of the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Directory of the signing store
    pub signer_db_path: String,
    /// Tick of the replay loop over `available` records
    #[serde(with = "humantime_serde")]
    pub retry_interval: Duration,
    /// `(chain, vault)` groups signed concurrently
    pub workers: usize,
    /// Encrypts signing-store records when non-empty
    pub passphrase: String,
    /// Consensus-side scanner settings
    pub block_scanner: BlockScannerConfig,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            signer_db_path: "signer_db".to_string(),
            retry_interval: Duration::from_secs(2),
            workers: 2,
            passphrase: String::new(),
            block_scanner: BlockScannerConfig {
                db_path: "signer_db".to_string(),
                ..BlockScannerConfig::for_chain(Chain::thor())
            },
        }
    }
}

impl SignerConfig {
    /// Fast timings for tests.
    pub fn for_testing() -> Self {
        Self {
            signer_db_path: String::new(),
            retry_interval: Duration::from_millis(20),
            block_scanner: BlockScannerConfig::for_testing(Chain::thor()),
            ..Default::default()
        }
    }

    /// Reject settings the signer cannot run with.
    pub fn validate(&self) -> Result<(), SignerError> {
        if self.workers == 0 {
            return Err(SignerError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.retry_interval.is_zero() {
            return Err(SignerError::InvalidConfig(
                "retry_interval must not be zero".into(),
            ));
        }
        self.block_scanner
            .validate()
            .map_err(|e| SignerError::InvalidConfig(e.to_string()))
    }
}
