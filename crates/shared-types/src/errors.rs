//! # Error Types
//!
//! Validation errors for the shared domain vocabulary.

use shared_crypto::CryptoError;
use thiserror::Error;

/// Errors raised while building or converting shared types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Chain tag is not 3-10 ASCII letters.
    #[error("Invalid chain tag '{tag}': {reason}")]
    InvalidChain {
        /// Offending tag
        tag: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Asset string is not `CHAIN.SYMBOL`.
    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    /// Public key text could not be decoded.
    #[error("Invalid pubkey '{key}': {reason}")]
    InvalidPubKey {
        /// Offending key text
        key: String,
        /// Decoder message
        reason: String,
    },

    /// Address cannot be derived for this chain.
    #[error("Unsupported chain for address derivation: {0}")]
    UnsupportedChain(String),

    /// Unknown `NET` value.
    #[error("Unknown chain network: {0}")]
    UnknownNetwork(String),

    /// Underlying crypto failure.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
