//! Per-height Bitcoin bookkeeping: block hashes for reorg detection and the
//! vault UTXOs this node may spend.
//!
//! Keys: `blockmeta-<height>` (JSON `BlockMeta`), in the same store as the
//! chain's scanner state.

use serde::{Deserialize, Serialize};
use shared_storage::{BatchOperation, KeyValueStore};
use shared_types::PubKey;
use std::sync::Arc;

use crate::ChainClientError;

/// Heights of bookkeeping kept below the newest block.
pub const BLOCK_CACHE_SIZE: i64 = 100;

const BLOCK_META_PREFIX: &str = "blockmeta-";

fn block_meta_key(height: i64) -> Vec<u8> {
    format!("{BLOCK_META_PREFIX}{height}").into_bytes()
}

/// A spendable vault output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentTransactionOutput {
    /// Funding txid (display order)
    pub txid: String,
    /// Output index
    pub n: u32,
    /// Satoshis
    pub value: u64,
    /// Height the output was recorded at
    pub block_height: i64,
    /// Vault that controls it
    pub vault_pubkey: PubKey,
}

impl UnspentTransactionOutput {
    /// `txid:n`
    pub fn key(&self) -> String {
        format!("{}:{}", self.txid, self.n)
    }
}

/// Bookkeeping of one Bitcoin height.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    /// Height
    pub height: i64,
    /// Hash of the block seen at this height
    pub block_hash: String,
    /// Its parent hash
    pub previous_hash: String,
    /// Vault outputs recorded at this height
    #[serde(default)]
    pub utxos: Vec<UnspentTransactionOutput>,
    /// Txids this node broadcast while this was the tip
    #[serde(default)]
    pub self_transactions: Vec<String>,
}

impl BlockMeta {
    /// Empty bookkeeping for a block.
    pub fn new(height: i64, block_hash: impl Into<String>, previous_hash: impl Into<String>) -> Self {
        Self {
            height,
            block_hash: block_hash.into(),
            previous_hash: previous_hash.into(),
            ..Default::default()
        }
    }

    /// Outputs controlled by `vault`.
    pub fn utxos_of<'a>(
        &'a self,
        vault: &'a PubKey,
    ) -> impl Iterator<Item = &'a UnspentTransactionOutput> + 'a {
        self.utxos.iter().filter(move |u| &u.vault_pubkey == vault)
    }

    /// Record `utxo` unless its key is already present.
    pub fn add_utxo(&mut self, utxo: UnspentTransactionOutput) {
        if self.utxos.iter().all(|u| u.key() != utxo.key()) {
            self.utxos.push(utxo);
        }
    }

    /// Drop the output `key`. Returns whether it was present.
    pub fn remove_utxo(&mut self, key: &str) -> bool {
        let before = self.utxos.len();
        self.utxos.retain(|u| u.key() != key);
        before != self.utxos.len()
    }

    /// Remember a txid this node broadcast.
    pub fn add_self_transaction(&mut self, txid: impl Into<String>) {
        let txid = txid.into();
        if !self.self_transactions.contains(&txid) {
            self.self_transactions.push(txid);
        }
    }
}

/// `BlockMeta` persistence.
#[derive(Clone)]
pub struct BlockMetaStore {
    db: Arc<dyn KeyValueStore>,
}

impl BlockMetaStore {
    /// Store over `db`.
    pub fn new(db: Arc<dyn KeyValueStore>) -> Self {
        Self { db }
    }

    /// Bookkeeping of `height`, if any.
    pub fn get(&self, height: i64) -> Result<Option<BlockMeta>, ChainClientError> {
        self.db
            .get(&block_meta_key(height))?
            .map(|buf| serde_json::from_slice(&buf).map_err(|e| ChainClientError::decode("block meta", e)))
            .transpose()
    }

    /// Persist `meta` under its height.
    pub fn save(&self, meta: &BlockMeta) -> Result<(), ChainClientError> {
        let buf =
            serde_json::to_vec(meta).map_err(|e| ChainClientError::decode("block meta", e))?;
        self.db.put(&block_meta_key(meta.height), &buf)?;
        Ok(())
    }

    /// Every stored height, ascending.
    pub fn all(&self) -> Result<Vec<BlockMeta>, ChainClientError> {
        let mut metas = self
            .db
            .prefix_scan(BLOCK_META_PREFIX.as_bytes())?
            .into_iter()
            .map(|(_, buf)| {
                serde_json::from_slice::<BlockMeta>(&buf)
                    .map_err(|e| ChainClientError::decode("block meta", e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        metas.sort_by_key(|m| m.height);
        Ok(metas)
    }

    /// Delete every height below `height`.
    pub fn prune_below(&self, height: i64) -> Result<usize, ChainClientError> {
        let ops: Vec<BatchOperation> = self
            .all()?
            .into_iter()
            .filter(|m| m.height < height)
            .map(|m| BatchOperation::delete(block_meta_key(m.height)))
            .collect();
        let pruned = ops.len();
        if pruned > 0 {
            self.db.atomic_batch_write(ops)?;
        }
        Ok(pruned)
    }

    /// Remove the outputs `keys` wherever they are recorded.
    pub fn spend(&self, keys: &[String]) -> Result<(), ChainClientError> {
        for mut meta in self.all()? {
            let mut changed = false;
            for key in keys {
                changed |= meta.remove_utxo(key);
            }
            if changed {
                self.save(&meta)?;
            }
        }
        Ok(())
    }

    /// Sum of `vault`'s outputs in satoshis.
    pub fn balance(&self, vault: &PubKey) -> Result<u64, ChainClientError> {
        Ok(self
            .all()?
            .iter()
            .flat_map(|m| m.utxos_of(vault))
            .map(|u| u.value)
            .sum())
    }
}
