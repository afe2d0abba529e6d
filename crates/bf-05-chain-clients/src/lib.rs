//! # bf-05-chain-clients
//!
//! One adapter per external chain behind the [`ChainClient`] contract. Each
//! adapter owns a block scanner over its chain's RPC and knows how to sign
//! and broadcast an outbound transfer for a vault.
//!
//! ## Adapters
//!
//! | Chain | RPC | Signed payload | Duplicate broadcast |
//! |-------|-----|----------------|---------------------|
//! | BNB | Tendermint RPC + REST | hex of the JSON `StdTx` | "duplicate", "already exists" |
//! | BTC | bitcoind JSON-RPC 1.0 | segwit v0 transaction | code -27 |
//! | ETH | JSON-RPC 2.0 | EIP-155 legacy RLP | "already known", "nonce too low" |
//!
//! ## Signing
//!
//! ```text
//! sign(item) ─► build chain tx ─► digest(s) ─► VaultSigner
//!                                                 ├── vault == node key ─► local secp256k1
//!                                                 └── otherwise ─► keysign party ─► threshold service
//!                                                                    └── not selected ─► empty payload
//! ```
//!
//! Per-vault replay counters (BNB sequence, ETH nonce) and the BTC UTXO set
//! are only advanced after a successful broadcast.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(test)]
mod tests_support;

pub use adapters::{BinanceClient, BitcoinClient, EthereumClient, JsonRpcClient, VaultSigner};
pub use domain::{Account, ChainClientError, ChainConfiguration};
pub use ports::inbound::{ChainClient, MockChainClient};
pub use service::{load_chain, load_chains, ChainClientDeps};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
