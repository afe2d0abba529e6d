//! # bf-06-observer
//!
//! Single consumer of the block queue every chain scanner writes into. For
//! each scanned block it keeps the transfers that touch a registered vault,
//! turns them into witness messages and broadcasts them to thorchain.
//!
//! ## Flow
//!
//! ```text
//! chain scanners ──► inbound queue ──► filter ──► convert ──► ObservedTxIn / ObservedTxOut ──► broadcast
//!                                                                                              │
//!                                                             adapter.on_observed(item) ◄──────┘
//! ```
//!
//! A transfer between two vaults is witnessed twice: once as outbound of the
//! sender vault and once as inbound of the recipient vault. Consensus
//! deduplicates witnesses by `(tx id, vault)`, so replays of the same height
//! are harmless.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod service;

pub use domain::{to_observed_tx, validate_tx_id, ObserverError, DEFAULT_QUEUE_CAPACITY};
pub use service::Observer;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
