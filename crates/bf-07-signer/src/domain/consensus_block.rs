//! What one consensus height yields for this node.

use shared_types::{KeygenBlock, TxOut};

/// Signing and keygen instructions found at one consensus height.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusBlock {
    /// Consensus height
    pub height: i64,
    /// Non-empty instruction batches, one per `(vault, chain)`
    pub tx_outs: Vec<TxOut>,
    /// Keygen assignments for the node key, if any
    pub keygen: Option<KeygenBlock>,
}

impl ConsensusBlock {
    /// Nothing to sign and nothing to generate.
    pub fn is_empty(&self) -> bool {
        self.tx_outs.is_empty() && self.keygen.is_none()
    }
}
