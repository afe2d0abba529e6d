//! # bf-04-tss
//!
//! Client of the local threshold signing service.
//!
//! | Call | Request | Reply |
//! |------|---------|-------|
//! | keysign | `POST /keysign {pool_pub_key, message, signer_pub_keys}` | `{r, s, status, blame}` |
//! | keygen | `POST /keygen {keys}` | `{pub_key, status, blame}` |
//! | peer id | `GET /p2pid` | text |
//!
//! `status` is `0` (ok), `1` (fail, see blame) or `2` (this node was not
//! selected). Signatures come back as big-endian `r` and `s`; they are
//! left-padded to 32 bytes each and `s` is forced into the low half of the
//! curve order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    assemble_signature, KeygenRequest, KeygenResponse, KeysignRequest, KeysignResponse, TssConfig,
    TssError, TssStatus,
};
pub use ports::inbound::{MockTssServer, ThresholdSigner};
pub use service::TssClient;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
