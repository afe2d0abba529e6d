//! Threshold service endpoint.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::TssError;

/// Where the local threshold service listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TssConfig {
    /// `http` or `https`
    pub scheme: String,
    /// Host name
    pub host: String,
    /// Port
    pub port: u16,
    /// Deadline of one keysign or keygen round
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for TssConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 8322,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl TssConfig {
    /// Reject an unusable endpoint.
    pub fn validate(&self) -> Result<(), TssError> {
        if self.host.is_empty() {
            return Err(TssError::InvalidConfig("TSS host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(TssError::InvalidConfig("TSS port not specified".to_string()));
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(TssError::InvalidConfig(format!(
                "unsupported TSS scheme {}",
                self.scheme
            )));
        }
        Ok(())
    }

    /// `scheme://host:port`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}
