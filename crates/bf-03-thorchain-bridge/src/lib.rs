//! # bf-03-thorchain-bridge
//!
//! Client of the local consensus node: height queries, vault and node
//! account lookups, signing instructions, and the signed broadcast of
//! witness messages.
//!
//! ## Broadcast Critical Section
//!
//! ```text
//! lock(account) ─► tip > last read? ─yes─► GET /auth/accounts  (sequence = max(remote, local))
//!                        │
//!                        ▼
//!                 sign canonical sign doc (sha256, low-S)
//!                        │
//!                        ▼
//!                 POST /txs {tx, mode: sync}
//!                   ├── code == 0, logs ok ─► sequence += 1
//!                   └── refused ────────────► sequence kept; "sequence" in log forces a re-read
//! ```
//!
//! ## Messages
//!
//! | Type | Built by |
//! |------|----------|
//! | `thorchain/ObservedTxIn` | `get_observations_std_tx` (recipient is the vault) |
//! | `thorchain/ObservedTxOut` | `get_observations_std_tx` (sender is the vault) |
//! | `thorchain/MsgTssPool` | `get_keygen_std_tx` |
//! | `thorchain/MsgTssKeysignFail` | `get_keysign_fail_std_tx` |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{BridgeHeightSource, BridgePubKeySource, Keys, RetryingHttpClient};
pub use domain::*;
pub use ports::inbound::{
    MockThorchainBridge, ThorchainBridge, WHITELIST_ATTEMPTS, WHITELIST_INTERVAL,
};
pub use service::ThorchainBridgeClient;

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
