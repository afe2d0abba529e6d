//! Consensus REST response shapes.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use shared_types::{Address, Chain, PubKey, TxOut};
use std::collections::BTreeMap;

/// `/thorchain/lastblock/<chain>` entry.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResHeights {
    /// External chain
    pub chain: Chain,
    /// Last external height witnessed by consensus
    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub lastobservedin: i64,
    /// Last consensus height whose outbound was signed
    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub lastsignedout: i64,
    /// Consensus tip
    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub statechain: i64,
}

/// Lifecycle state of a node account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Not yet bonded
    #[default]
    Unknown,
    /// Accepted, waiting to bond
    Whitelisted,
    /// Waiting to become active
    Standby,
    /// Ready to rotate in
    Ready,
    /// Signing for vaults
    Active,
    /// Left the network
    Disabled,
}

/// Keys a node registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKeySet {
    /// secp256k1 key
    #[serde(default)]
    pub secp256k1: PubKey,
    /// ed25519 key
    #[serde(default)]
    pub ed25519: PubKey,
}

/// `/thorchain/nodeaccount/<addr>` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAccount {
    /// Node address
    #[serde(default)]
    pub node_address: Address,
    /// Lifecycle state
    #[serde(default)]
    pub status: NodeStatus,
    /// Registered keys
    #[serde(default)]
    pub pub_key_set: PubKeySet,
    /// Vault keys this node holds shares of
    #[serde(default, deserialize_with = "null_as_empty")]
    pub signer_membership: Vec<PubKey>,
}

impl NodeAccount {
    /// Whether the node has registered its keys.
    pub fn has_keys(&self) -> bool {
        !self.pub_key_set.secp256k1.is_empty()
    }
}

/// Account number and sequence of the node.
#[serde_as]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account number
    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub account_number: u64,
    /// Next sequence
    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub sequence: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountValue {
    pub value: AccountInfo,
}

/// `/auth/accounts/<addr>` response.
#[derive(Debug, Deserialize)]
pub(crate) struct AccountResp {
    pub result: AccountValue,
}

/// One per-message log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLog {
    /// Whether the message executed
    #[serde(default)]
    pub success: bool,
    /// Log text
    #[serde(default)]
    pub log: String,
}

/// `/txs` response.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    /// Consensus height (0 in sync mode)
    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub height: i64,
    /// Transaction hash
    #[serde(default)]
    pub txhash: String,
    /// Result code; 0 is success
    #[serde(default)]
    pub code: u32,
    /// Raw log
    #[serde(default)]
    pub raw_log: String,
    /// Per-message logs
    #[serde(default, deserialize_with = "null_as_empty")]
    pub logs: Vec<TxLog>,
}

impl BroadcastResult {
    /// First failure text, if the broadcast was rejected.
    pub fn failure(&self) -> Option<String> {
        if self.code > 0 {
            return Some(self.raw_log.clone());
        }
        self.logs
            .iter()
            .find(|entry| !entry.success)
            .map(|entry| entry.log.clone())
    }
}

/// `/thorchain/keysign/<h>/<pk>` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChainsTxOut {
    /// Outbound instructions keyed by chain
    #[serde(default)]
    pub chains: BTreeMap<Chain, TxOut>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct KeygenResp {
    pub keygen_block: shared_types::KeygenBlock,
}

/// `/thorchain/vaults/pubkeys` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VaultPubKeysResp {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub asgard: Vec<PubKey>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub yggdrasil: Vec<PubKey>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heights_accept_strings() {
        let json = r#"{"chain":"BNB","lastobservedin":"120","lastsignedout":3,"statechain":"44"}"#;
        let heights: QueryResHeights = serde_json::from_str(json).unwrap();
        assert_eq!(heights.chain, Chain::bnb());
        assert_eq!(heights.lastobservedin, 120);
        assert_eq!(heights.lastsignedout, 3);
        assert_eq!(heights.statechain, 44);
    }

    #[test]
    fn test_node_account() {
        let json = r#"{
            "node_address": "tthor1node",
            "status": "active",
            "pub_key_set": {"secp256k1": "tthorpub1abc", "ed25519": ""},
            "signer_membership": null
        }"#;
        let na: NodeAccount = serde_json::from_str(json).unwrap();
        assert_eq!(na.status, NodeStatus::Active);
        assert!(na.has_keys());
        assert!(na.signer_membership.is_empty());
    }

    #[test]
    fn test_account_resp() {
        let json = r#"{"result":{"value":{"account_number":"12","sequence":"7"}}}"#;
        let resp: AccountResp = serde_json::from_str(json).unwrap();
        assert_eq!(resp.result.value.account_number, 12);
        assert_eq!(resp.result.value.sequence, 7);
    }

    #[test]
    fn test_broadcast_failure() {
        let ok: BroadcastResult =
            serde_json::from_str(r#"{"txhash":"AA","logs":[{"success":true,"log":""}]}"#)
                .unwrap();
        assert!(ok.failure().is_none());

        let coded: BroadcastResult =
            serde_json::from_str(r#"{"txhash":"AA","code":4,"raw_log":"unauthorized"}"#).unwrap();
        assert_eq!(coded.failure().as_deref(), Some("unauthorized"));

        let logged: BroadcastResult = serde_json::from_str(
            r#"{"txhash":"AA","logs":[{"success":true,"log":""},{"success":false,"log":"bad msg"}]}"#,
        )
        .unwrap();
        assert_eq!(logged.failure().as_deref(), Some("bad msg"));
    }

    #[test]
    fn test_chains_tx_out() {
        let json = r#"{"chains":{"BNB":{"height":"5","tx_array":null}}}"#;
        let out: ChainsTxOut = serde_json::from_str(json).unwrap();
        assert_eq!(out.chains[&Chain::bnb()].height, 5);
        assert!(out.chains[&Chain::bnb()].tx_array.is_empty());
    }
}
