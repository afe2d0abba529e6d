//! Error types for chain adapters.

use bf_01_block_scanner::{FetchError, ScannerError};
use bf_03_thorchain_bridge::{BridgeError, HttpError};
use bf_04_tss::TssError;
use shared_crypto::CryptoError;
use shared_storage::KVStoreError;
use shared_types::{Blame, TypesError};
use thiserror::Error;

/// Chain adapter errors.
#[derive(Debug, Error)]
pub enum ChainClientError {
    /// The requested height is above the chain tip. Never logged.
    #[error("Block at height {0} is not yet produced")]
    HeightNotYetProduced(i64),

    /// HTTP exchange with the chain RPC failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The RPC answered with an error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Server message
        message: String,
    },

    /// A chain response could not be decoded.
    #[error("Failed to decode {what}: {message}")]
    Decode {
        /// What was being decoded
        what: &'static str,
        /// Decoder message
        message: String,
    },

    /// The threshold round failed and named culprits.
    #[error("Keysign blamed {0}")]
    Blame(Blame),

    /// Threshold service failure without attribution.
    #[error("Threshold signing failed: {0}")]
    Tss(TssError),

    /// Consensus lookup failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Key or signature handling failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Adapter-local store failed.
    #[error("Chain client storage error: {0}")]
    Storage(#[from] KVStoreError),

    /// Scanner could not be created or initialised.
    #[error(transparent)]
    Scanner(#[from] ScannerError),

    /// The signing instruction cannot be turned into a transaction.
    #[error("Invalid signing instruction: {0}")]
    InvalidInstruction(String),

    /// The vault cannot cover the transfer and its fee.
    #[error("Insufficient funds: need {need}, have {have}")]
    InsufficientFunds {
        /// Amount required, in 1e8 units
        need: u64,
        /// Amount available, in 1e8 units
        have: u64,
    },

    /// No adapter exists for the configured chain.
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    /// Address or key conversion failed.
    #[error(transparent)]
    Types(#[from] TypesError),

    /// Configuration rejected by `validate()`.
    #[error("Invalid chain configuration: {0}")]
    InvalidConfig(String),
}

impl ChainClientError {
    /// Decode failure helper.
    pub fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        ChainClientError::Decode {
            what,
            message: err.to_string(),
        }
    }

    /// Blame carried by a failed threshold round.
    pub fn blame(&self) -> Option<&Blame> {
        match self {
            ChainClientError::Blame(blame) => Some(blame),
            _ => None,
        }
    }

    /// Whether the failure may clear on retry (transport, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            ChainClientError::Http(e) => e.is_transient(),
            ChainClientError::Bridge(BridgeError::Http(e)) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<TssError> for ChainClientError {
    fn from(err: TssError) -> Self {
        match err {
            TssError::Blame(blame) => ChainClientError::Blame(blame),
            other => ChainClientError::Tss(other),
        }
    }
}

impl From<ChainClientError> for FetchError {
    fn from(err: ChainClientError) -> Self {
        match err {
            ChainClientError::HeightNotYetProduced(height) => {
                FetchError::HeightNotYetProduced(height)
            }
            other => FetchError::Failed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blame_is_a_distinct_variant() {
        let err: ChainClientError = TssError::Blame(Blame::new("timeout", &["tthorpub1n3"])).into();
        assert_eq!(err.blame().map(|b| b.fail_reason.as_str()), Some("timeout"));

        let err: ChainClientError = TssError::Failed("network".to_string()).into();
        assert!(err.blame().is_none());
        assert!(matches!(err, ChainClientError::Tss(_)));
    }

    #[test]
    fn test_not_yet_produced_maps_to_fetch_error() {
        let fetch: FetchError = ChainClientError::HeightNotYetProduced(11).into();
        assert!(fetch.is_not_yet_produced());

        let fetch: FetchError = ChainClientError::decode("block", "bad json").into();
        assert!(matches!(fetch, FetchError::Failed(m) if m.contains("bad json")));
    }

    #[test]
    fn test_transient_classification() {
        let err: ChainClientError = HttpError::Status {
            url: "http://x".into(),
            status: 503,
            body: String::new(),
        }
        .into();
        assert!(err.is_transient());
        assert!(!ChainClientError::InvalidInstruction("x".into()).is_transient());
    }
}
