//! Signing-store records.

use serde::{Deserialize, Serialize};
use shared_crypto::sha256;
use shared_types::TxOutItem;
use std::fmt;

/// Key prefix of every record.
pub const TX_OUT_PREFIX: &str = "txoutitem-";

/// Processing state of one signing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Waiting to be signed (or re-signed)
    Available,
    /// Signed and broadcast by this node, or this node was not selected
    Processed,
    /// Completed by the network; never touched again
    Spent,
}

impl TxStatus {
    /// Whether moving from `self` to `next` is allowed. Only
    /// `available → processed` and `any → spent` are.
    pub fn can_become(self, next: TxStatus) -> bool {
        self == next
            || next == TxStatus::Spent
            || (self == TxStatus::Available && next == TxStatus::Processed)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Available => "available",
            TxStatus::Processed => "processed",
            TxStatus::Spent => "spent",
        };
        f.write_str(s)
    }
}

/// Stored signing instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutStoreItem {
    /// The instruction as received from consensus
    pub tx_out_item: TxOutItem,
    /// Processing state
    pub status: TxStatus,
    /// Consensus height the instruction was issued at
    pub height: i64,
    /// Consensus height of the last blamed attempt; 0 when none
    #[serde(default)]
    pub blame_height: i64,
}

impl TxOutStoreItem {
    /// Fresh `available` record.
    pub fn new(height: i64, tx_out_item: TxOutItem) -> Self {
        Self {
            tx_out_item,
            status: TxStatus::Available,
            height,
            blame_height: 0,
        }
    }

    /// Store key, `txoutitem-<hex sha256>`.
    pub fn key(&self) -> String {
        instruction_key(&self.tx_out_item, self.height)
    }

    /// `chain-vault`, the unit signed sequentially.
    pub fn group(&self) -> String {
        format!("{}-{}", self.tx_out_item.chain, self.tx_out_item.vault_pubkey)
    }
}

/// Key of `item` issued at `height`.
///
/// Hashes a fixed rendering of vault, chain, recipient, coins, memo,
/// inbound hash and height, so the key does not depend on how the
/// instruction was serialised. `out_hash` and `max_gas` are left out: they
/// change while the instruction itself stays the same.
pub fn instruction_key(item: &TxOutItem, height: i64) -> String {
    let coins: Vec<String> = item
        .coins
        .iter()
        .map(|c| format!("{}:{}", c.asset, c.amount))
        .collect();
    let canonical = format!(
        "{}|{}|{}|{}|{}|{}|{}",
        item.vault_pubkey,
        item.chain,
        item.to_address.as_str().to_ascii_lowercase(),
        coins.join(","),
        item.memo,
        item.in_hash.to_ascii_uppercase(),
        height
    );
    format!("{TX_OUT_PREFIX}{}", hex::encode(sha256(canonical.as_bytes())))
}

/// Whether `a` and `b` describe the same transfer.
pub fn same_instruction(a: &TxOutItem, b: &TxOutItem) -> bool {
    a.chain == b.chain
        && a.vault_pubkey == b.vault_pubkey
        && a.to_address == b.to_address
        && a.coins == b.coins
        && a.memo == b.memo
        && a.in_hash.eq_ignore_ascii_case(&b.in_hash)
}
