//! Key selection for outbound transfers.
//!
//! A vault equal to the node's own key (yggdrasil) is signed locally; any
//! other vault goes through the threshold service with the party consensus
//! picked for it.

use bf_03_thorchain_bridge::{Keys, ThorchainBridge};
use bf_04_tss::ThresholdSigner;
use shared_types::PubKey;
use std::sync::Arc;
use tracing::debug;

use crate::ChainClientError;

/// Signs 32-byte digests on behalf of a vault.
#[derive(Clone)]
pub struct VaultSigner {
    keys: Keys,
    tss: Arc<dyn ThresholdSigner>,
    bridge: Arc<dyn ThorchainBridge>,
}

impl VaultSigner {
    /// Signer using the node key and the given threshold service.
    pub fn new(keys: Keys, tss: Arc<dyn ThresholdSigner>, bridge: Arc<dyn ThorchainBridge>) -> Self {
        Self { keys, tss, bridge }
    }

    /// The node key handle.
    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// Whether `vault` is the node's own key.
    pub fn is_node_key(&self, vault: &PubKey) -> Result<bool, ChainClientError> {
        Ok(&self.keys.pubkey()? == vault)
    }

    /// 64-byte low-S `r || s` over `digest`. `None` means the threshold
    /// service did not select this node.
    pub async fn sign_digest(
        &self,
        vault: &PubKey,
        digest: &[u8; 32],
    ) -> Result<Option<[u8; 64]>, ChainClientError> {
        if self.is_node_key(vault)? {
            let signature = self.keys.key_pair().sign_prehash(digest)?;
            return Ok(Some(*signature.as_bytes()));
        }
        let party = self.bridge.get_keysign_party(vault).await?;
        debug!(vault = %vault, party = party.len(), "[bf-05] Threshold keysign");
        Ok(self.tss.keysign(digest, vault, &party).await?)
    }
}
