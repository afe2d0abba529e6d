//! # Transaction Views
//!
//! Inbound views (`TxIn`/`TxInItem`) flow from chain scanners to the
//! observer. Outbound views (`TxOut`/`TxOutItem`) are signing instructions
//! read from the consensus chain. `KeygenBlock` carries vault-creation
//! assignments.

use crate::{Address, Asset, Chain, Coin, Coins, Gas, PubKey, PubKeys};
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

/// One observed external transfer.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInItem {
    /// External block height
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub block_height: i64,
    /// External tx hash
    pub tx: String,
    /// UTF-8 memo
    #[serde(default)]
    pub memo: String,
    /// Sending address
    pub sender: Address,
    /// Receiving address
    pub to: Address,
    /// Coins moved
    #[serde(default)]
    pub coins: Coins,
    /// Fee paid
    #[serde(default)]
    pub gas: Gas,
    /// Vault the item is observed against; filled by the observer
    #[serde(default)]
    pub observed_vault_pubkey: PubKey,
}

/// All relevant transfers of one external block.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// Source chain
    pub chain: Chain,
    /// External block height
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub block_height: i64,
    /// Transfers
    pub tx_array: Vec<TxInItem>,
    /// Set once the observer has filtered the items against the registry
    #[serde(default)]
    pub filtered: bool,
}

impl TxIn {
    /// An empty block for `chain` at `height`.
    pub fn empty(chain: Chain, height: i64) -> Self {
        Self {
            chain,
            block_height: height,
            tx_array: Vec::new(),
            filtered: false,
        }
    }

    /// Whether the block carries no transfers.
    pub fn is_empty(&self) -> bool {
        self.tx_array.is_empty()
    }
}

/// One signing instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutItem {
    /// Destination chain
    pub chain: Chain,
    /// Recipient; empty means nothing to send
    #[serde(rename = "to", default)]
    pub to_address: Address,
    /// Vault that must sign
    pub vault_pubkey: PubKey,
    /// Coins to send. The consensus codec emits a single `coin`; an empty
    /// asset means "to be resolved by the signer".
    #[serde(alias = "coin", default, deserialize_with = "coins_one_or_many")]
    pub coins: Coins,
    /// Memo written to the destination chain
    #[serde(default)]
    pub memo: String,
    /// Fee ceiling
    #[serde(default)]
    pub max_gas: Gas,
    /// Originating inbound hash
    #[serde(default)]
    pub in_hash: String,
    /// Completion hash; empty until the network records completion
    #[serde(default)]
    pub out_hash: String,
}

/// Signing instructions of one consensus height.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Consensus height
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub height: i64,
    /// Instructions
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tx_array: Vec<TxOutItem>,
}

/// Kind of vault a keygen creates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeygenType {
    /// Threshold vault shared by many nodes
    #[default]
    #[serde(alias = "asgard")]
    AsgardKeygen,
    /// Single-node vault
    #[serde(alias = "yggdrasil")]
    YggdrasilKeygen,
}

/// One keygen assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keygen {
    /// Participants
    #[serde(default)]
    pub members: PubKeys,
    /// Vault kind
    #[serde(rename = "type", default)]
    pub keygen_type: KeygenType,
}

/// Keygen assignments of one consensus height.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeygenBlock {
    /// Consensus height; 0 means "not available yet"
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub height: i64,
    /// Assignments
    #[serde(default, deserialize_with = "null_as_empty")]
    pub keygens: Vec<Keygen>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[serde_as]
#[derive(Deserialize)]
struct RawCoin {
    #[serde(default)]
    asset: String,
    #[serde(default)]
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    amount: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(RawCoin),
    Many(Vec<RawCoin>),
}

fn coins_one_or_many<'de, D>(deserializer: D) -> Result<Coins, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(coin)) => vec![coin],
        Some(OneOrMany::Many(coins)) => coins,
    };
    raw.into_iter()
        .filter(|c| !c.asset.trim().is_empty())
        .map(|c| {
            let asset: Asset = c.asset.parse().map_err(serde::de::Error::custom)?;
            Ok(Coin::new(asset, c.amount))
        })
        .collect()
}
