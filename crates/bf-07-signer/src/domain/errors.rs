//! Error types for the signer.

use bf_01_block_scanner::ScannerError;
use bf_03_thorchain_bridge::BridgeError;
use bf_04_tss::TssError;
use bf_05_chain_clients::ChainClientError;
use shared_crypto::CryptoError;
use shared_storage::KVStoreError;
use shared_types::Chain;
use thiserror::Error;

use crate::TxStatus;

/// Signer errors.
#[derive(Debug, Error)]
pub enum SignerError {
    /// Signing store failed.
    #[error("Signer storage error: {0}")]
    Storage(#[from] KVStoreError),

    /// A stored record could not be sealed or opened.
    #[error("Failed to seal signer record: {0}")]
    Crypto(#[from] CryptoError),

    /// A stored record could not be decoded.
    #[error("Corrupt signer record '{key}': {message}")]
    Corrupt {
        /// Offending key
        key: String,
        /// Decoder message
        message: String,
    },

    /// Rejected status change.
    #[error("Record {key} cannot go from {from} to {to}")]
    StatusDowngrade {
        /// Record key
        key: String,
        /// Stored status
        from: TxStatus,
        /// Requested status
        to: TxStatus,
    },

    /// No adapter is loaded for the instruction's chain.
    #[error("Chain {0} is not supported")]
    UnsupportedChain(Chain),

    /// Chain adapter failed.
    #[error(transparent)]
    Chain(#[from] ChainClientError),

    /// Consensus client failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Threshold service failed.
    #[error(transparent)]
    Tss(#[from] TssError),

    /// Consensus-side scanner failed.
    #[error(transparent)]
    Scanner(#[from] ScannerError),

    /// Configuration rejected by `validate()`.
    #[error("Invalid signer configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downgrade_message() {
        let err = SignerError::StatusDowngrade {
            key: "txoutitem-ab".into(),
            from: TxStatus::Spent,
            to: TxStatus::Available,
        };
        assert_eq!(
            err.to_string(),
            "Record txoutitem-ab cannot go from spent to available"
        );
    }
}
