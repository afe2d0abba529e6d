//! Error types for the block scanner.

use shared_storage::KVStoreError;
use thiserror::Error;

/// Errors returned by a [`crate::BlockFetcher`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The requested height is above the chain tip. Never logged.
    #[error("Block at height {0} is not yet produced")]
    HeightNotYetProduced(i64),

    /// Any other failure; the height is tracked as failed.
    #[error("Failed to fetch block: {0}")]
    Failed(String),
}

impl FetchError {
    /// Whether this is the silent "come back later" case.
    pub fn is_not_yet_produced(&self) -> bool {
        matches!(self, FetchError::HeightNotYetProduced(_))
    }
}

/// Block scanner errors.
#[derive(Debug, Error)]
pub enum ScannerError {
    /// Underlying store failed.
    #[error("Scanner storage error: {0}")]
    Storage(#[from] KVStoreError),

    /// A stored record could not be decoded.
    #[error("Corrupt scanner record '{key}': {message}")]
    Corrupt {
        /// Offending key
        key: String,
        /// Decoder message
        message: String,
    },

    /// Fetching from the chain failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Configuration rejected by `validate()`.
    #[error("Invalid block scanner configuration: {0}")]
    InvalidConfig(String),

    /// Start height could not be discovered.
    #[error("Failed to discover start height: {0}")]
    HeightDiscovery(String),
}
