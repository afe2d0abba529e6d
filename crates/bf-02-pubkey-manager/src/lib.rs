//! # bf-02-pubkey-manager
//!
//! Registry of vault public keys. It is the single gate deciding which
//! external-chain addresses are in scope for observation and which signing
//! instructions this node takes part in.
//!
//! ## Entry Flags
//!
//! | Flag | Set by | Meaning |
//! |------|--------|---------|
//! | `signer` | `add_pubkey(pk, true)`, keygen, node whitelisting | this node holds a share of the key |
//! | `node_account` | `add_node_pubkey` | the node's own key (yggdrasil) |
//!
//! `signer` is sticky: a later `add_pubkey(pk, false)` (for example from the
//! periodic consensus fetch) never clears it.
//!
//! ## Refresh
//!
//! Every `refresh_interval` (one minute by default) the registry pulls the
//! asgard and yggdrasil keys from the consensus layer and adds each one
//! with `signer = false`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{is_vault_memo, PubKeyEntry, PubKeyManagerError, VaultPubKeys};
pub use ports::inbound::PubKeyValidator;
pub use ports::outbound::{MockVaultPubKeySource, VaultPubKeySource};
pub use service::PubKeyManager;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
