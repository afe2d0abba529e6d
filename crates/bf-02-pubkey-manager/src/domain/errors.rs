//! Error types for the public-key registry.

use thiserror::Error;

/// Registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PubKeyManagerError {
    /// Consensus layer did not return the vault key list.
    #[error("Failed to fetch pubkeys from thorchain: {0}")]
    FetchFailed(String),

    /// The vault key list could not be decoded.
    #[error("Failed to unmarshal pubkeys: {0}")]
    Unmarshal(String),
}
