//! Signer domain: configuration, store records, consensus blocks and errors.

pub mod config;
pub mod consensus_block;
pub mod errors;
pub mod store_item;

pub use config::SignerConfig;
pub use consensus_block::ConsensusBlock;
pub use errors::SignerError;
pub use store_item::{instruction_key, same_instruction, TxOutStoreItem, TxStatus, TX_OUT_PREFIX};

/// Consensus heights after which an unsigned instruction is abandoned.
pub const SIGNING_TRANSACTION_PERIOD: i64 = 100;
