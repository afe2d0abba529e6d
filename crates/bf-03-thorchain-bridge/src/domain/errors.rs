//! Error types for the consensus bridge.

use shared_types::TypesError;
use thiserror::Error;

/// Failure of one HTTP exchange after retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    /// Connection refused, reset or timed out.
    #[error("Request to {url} failed: {message}")]
    Transport {
        /// Requested URL
        url: String,
        /// Transport message
        message: String,
    },

    /// Non-2xx response.
    #[error("Unexpected status {status} from {url}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// The client could not be built.
    #[error("Invalid HTTP client configuration: {0}")]
    Config(String),
}

impl HttpError {
    /// Whether another attempt may succeed (5xx, connect, timeout).
    pub fn is_transient(&self) -> bool {
        match self {
            HttpError::Transport { .. } => true,
            HttpError::Status { status, .. } => *status >= 500,
            HttpError::Config(_) => false,
        }
    }

    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Consensus bridge errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// HTTP exchange failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Response body could not be decoded.
    #[error("Failed to unmarshal {what}: {message}")]
    Decode {
        /// What was being decoded
        what: &'static str,
        /// Decoder message
        message: String,
    },

    /// Consensus rejected the broadcast.
    #[error("Failed to broadcast (code {code}): {log}")]
    Refused {
        /// Non-zero result code
        code: u32,
        /// Consensus log
        log: String,
        /// Hash assigned to the rejected tx, if any
        txhash: String,
    },

    /// Node key could not be loaded or used.
    #[error("Node key error: {0}")]
    Keys(String),

    /// Address or key conversion failed.
    #[error(transparent)]
    Types(#[from] TypesError),

    /// Observation batch was empty.
    #[error("Nothing to be signed")]
    NothingToSign,

    /// Neither sender nor recipient is the observed vault.
    #[error("Could not determine if tx {0} is inbound or outbound")]
    UnknownDirection(String),

    /// Node account is not ready to take part.
    #[error("Node is not whitelisted: {0}")]
    NotWhitelisted(String),

    /// Configuration rejected by `validate()`.
    #[error("Invalid thorchain configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeError {
    /// Decode failure helper.
    pub fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        BridgeError::Decode {
            what,
            message: err.to_string(),
        }
    }

    /// Whether consensus rejected the tx because of a stale sequence.
    pub fn is_sequence_mismatch(&self) -> bool {
        match self {
            BridgeError::Refused { log, .. } => log.contains("sequence"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let server = HttpError::Status {
            url: "u".into(),
            status: 503,
            body: String::new(),
        };
        let client = HttpError::Status {
            url: "u".into(),
            status: 404,
            body: String::new(),
        };
        let transport = HttpError::Transport {
            url: "u".into(),
            message: "connection refused".into(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(transport.is_transient());
        assert_eq!(client.status(), Some(404));
    }

    #[test]
    fn test_sequence_mismatch() {
        let err = BridgeError::Refused {
            code: 4,
            log: "signature verification failed; verify correct account sequence and chain-id"
                .into(),
            txhash: String::new(),
        };
        assert!(err.is_sequence_mismatch());
        assert!(err.to_string().contains("code 4"));
    }
}
