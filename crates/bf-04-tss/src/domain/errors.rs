//! Error types for the threshold service client.

use bf_03_thorchain_bridge::HttpError;
use shared_crypto::CryptoError;
use shared_types::Blame;
use thiserror::Error;

/// Threshold service errors.
#[derive(Debug, Error)]
pub enum TssError {
    /// The round failed and the service named the culprits.
    #[error("TSS round failed with blame: {0}")]
    Blame(Blame),

    /// The round failed and nobody could be blamed.
    #[error("TSS round failed without blame: {0}")]
    Failed(String),

    /// The service produced a signature that does not verify.
    #[error("BROKEN SIGNATURE")]
    BrokenSignature,

    /// HTTP exchange failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Response could not be decoded.
    #[error("Failed to decode TSS response: {0}")]
    Decode(String),

    /// Signature components were malformed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The message to sign is not a 32-byte digest.
    #[error("Keysign message must be 32 bytes, got {0}")]
    InvalidMessage(usize),

    /// Endpoint configuration rejected.
    #[error("Invalid TSS configuration: {0}")]
    InvalidConfig(String),
}

impl TssError {
    /// Blame carried by the error, if any.
    pub fn blame(&self) -> Option<&Blame> {
        match self {
            TssError::Blame(blame) => Some(blame),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blame_accessor() {
        let err = TssError::Blame(Blame::new("timeout", &["tthorpub1a"]));
        assert_eq!(err.blame().map(|b| b.blame_nodes.len()), Some(1));
        assert!(TssError::BrokenSignature.blame().is_none());
        assert_eq!(TssError::BrokenSignature.to_string(), "BROKEN SIGNATURE");
    }
}
