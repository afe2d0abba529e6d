//! Error types for the observer.

use bf_03_thorchain_bridge::BridgeError;
use bf_05_chain_clients::ChainClientError;
use shared_types::Chain;
use thiserror::Error;

/// Observer errors.
#[derive(Debug, Error)]
pub enum ObserverError {
    /// Scanned transaction id is not a 32-byte hex hash.
    #[error("Failed to parse tx hash, {0} is invalid")]
    InvalidTxHash(String),

    /// Sender or recipient is missing.
    #[error("Tx {tx} has an invalid {field} address")]
    InvalidAddress {
        /// Transaction id
        tx: String,
        /// `sender` or `to`
        field: &'static str,
    },

    /// Block height is not positive.
    #[error("Invalid block height {0}")]
    InvalidHeight(i64),

    /// Item is attributed to no vault.
    #[error("Tx {0} has no observed vault pubkey")]
    MissingVault(String),

    /// Witness transaction could not be built.
    #[error("Failed to sign the tx: {0}")]
    Sign(#[source] BridgeError),

    /// Witness transaction was not accepted.
    #[error("Failed to send the tx to thorchain: {0}")]
    Send(#[source] BridgeError),

    /// A chain scanner could not be started.
    #[error("Failed to start {chain} scanner: {source}")]
    ChainStart {
        /// Chain whose scanner failed
        chain: Chain,
        /// Adapter error
        #[source]
        source: ChainClientError,
    },
}

impl ObserverError {
    /// Label used on the `observer_error` counter.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::InvalidTxHash(_) => "fail_to_parse_tx_hash",
            Self::InvalidAddress { .. } | Self::InvalidHeight(_) | Self::MissingVault(_) => {
                "fail_to_convert_tx"
            }
            Self::Sign(_) => "fail_to_sign",
            Self::Send(_) => "fail_to_send_to_thorchain",
            Self::ChainStart { .. } => "fail_to_start",
        }
    }
}
