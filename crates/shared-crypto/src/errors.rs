//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (wrong passphrase or tampered data)
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Sealed payload is shorter than the nonce prefix
    #[error("Sealed payload too short: {0} bytes")]
    SealedTooShort(usize),

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Invalid signature
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signing failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Bech32 encode or decode failure
    #[error("Bech32 error: {0}")]
    Bech32(String),

    /// Address does not carry the expected human-readable prefix
    #[error("Unexpected address prefix: expected {expected}, got {actual}")]
    UnexpectedPrefix {
        /// Expected prefix
        expected: String,
        /// Actual prefix
        actual: String,
    },
}

impl From<bech32::Error> for CryptoError {
    fn from(err: bech32::Error) -> Self {
        CryptoError::Bech32(err.to_string())
    }
}
