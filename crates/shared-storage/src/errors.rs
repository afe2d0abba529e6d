//! Storage errors.

use thiserror::Error;

/// Errors from the key/value port.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError {
        /// Backend message
        message: String,
    },

    /// Stored bytes could not be decoded.
    #[error("KV store corruption: {message}")]
    CorruptionError {
        /// Decoder message
        message: String,
    },
}

impl KVStoreError {
    /// Shorthand for an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        KVStoreError::IOError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert!(KVStoreError::io("disk full").to_string().contains("disk full"));
        let err = KVStoreError::CorruptionError {
            message: "bad json".into(),
        };
        assert!(err.to_string().contains("corruption"));
    }
}
