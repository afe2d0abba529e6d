//! # bf-07-signer
//!
//! Signing side of the daemon: the consensus-side scanner, the durable
//! signing store, the signing pipeline and the keygen coordinator.
//!
//! ## Pipeline
//!
//! ```text
//! consensus scanner ──► dispatcher ──► signing store (available)
//!        │                                   │
//!        └── keygen ──► coordinator          ▼ tick / wake-up
//!                                      per (chain, vault) group, height order
//!                                            │
//!             blame hold-back ─► signer check ─► yggdrasil return coins
//!                                            │
//!             consensus cross-check ─► sign ─► broadcast ─► processed
//!                 └── out_hash set ─► spent      └── blame ─► KeysignFail
//! ```
//!
//! ## Record Status
//!
//! | From | To | When |
//! |------|----|------|
//! | available | processed | broadcast accepted, or not selected for the round |
//! | any | spent | completed by another node, or nothing to send |
//!
//! No other transition is accepted by the store, so a record that reached
//! `processed` or `spent` is never signed again.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod keygen;
pub mod ports;
pub mod service;

pub use adapters::{ConsensusFetcher, KvSignerStore};
pub use domain::*;
pub use keygen::KeygenCoordinator;
pub use ports::inbound::SignerStorage;
pub use service::{SignOutcome, Signer, SignerDeps};

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
