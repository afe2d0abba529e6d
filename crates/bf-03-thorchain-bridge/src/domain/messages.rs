//! Witness messages and the consensus transaction envelope.
//!
//! Messages are JSON objects tagged `{"type": ..., "value": ...}`. Signing
//! covers the canonical (recursively key-sorted, whitespace-free) JSON of a
//! [`StdSignDoc`], so the bytes do not depend on field declaration order.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};
use shared_crypto::{sha256, Secp256k1PublicKey};
use shared_types::{
    Address, Blame, Chain, Coins, Gas, KeygenType, PubKey, PubKeys, TxInItem,
};

use crate::BridgeError;

/// Fixed gas declared on every witness transaction.
pub const WITNESS_GAS: u64 = 100_000_000;

/// Amino type of the node's secp256k1 key.
const PUBKEY_TYPE: &str = "tendermint/PubKeySecp256k1";

/// External transfer as reported to consensus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    /// External transaction id
    pub id: String,
    /// External chain
    pub chain: Chain,
    /// Sender
    pub from_address: Address,
    /// Recipient
    pub to_address: Address,
    /// Transferred coins
    pub coins: Coins,
    /// Fee paid
    pub gas: Gas,
    /// Memo
    pub memo: String,
}

/// One observation: a transfer, where it was seen and which vault it touches.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedTx {
    /// The transfer
    pub tx: Tx,
    /// External block height
    #[serde_as(as = "DisplayFromStr")]
    pub block_height: i64,
    /// Vault the transfer was attributed to
    pub observed_pub_key: PubKey,
}

impl ObservedTx {
    /// Observation of `item` seen on `chain`.
    pub fn from_item(chain: &Chain, item: &TxInItem) -> Self {
        Self {
            tx: Tx {
                id: item.tx.clone(),
                chain: chain.clone(),
                from_address: item.sender.clone(),
                to_address: item.to.clone(),
                coins: item.coins.clone(),
                gas: item.gas.clone(),
                memo: item.memo.clone(),
            },
            block_height: item.block_height,
            observed_pub_key: item.observed_vault_pubkey.clone(),
        }
    }
}

/// A batch of observations in one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedTxBatch {
    /// Observations
    pub txs: Vec<ObservedTx>,
    /// Node account address
    pub signer: Address,
}

/// Keygen result report.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TssPoolMsg {
    /// Hash of members, pool key and height
    pub id: String,
    /// Resulting vault key; empty when the round failed
    pub pool_pub_key: PubKey,
    /// Vault kind
    pub keygen_type: KeygenType,
    /// Participants
    pub pubkeys: PubKeys,
    /// Consensus height of the keygen instruction
    #[serde_as(as = "DisplayFromStr")]
    pub height: i64,
    /// Blame when the round failed
    pub blame: Blame,
    /// Chains the new vault serves
    pub chains: Vec<Chain>,
    /// Node account address
    pub signer: Address,
}

impl TssPoolMsg {
    /// Build the report; the id is derived from its content.
    pub fn new(
        pool_pub_key: PubKey,
        keygen_type: KeygenType,
        pubkeys: PubKeys,
        height: i64,
        blame: Blame,
        chains: Vec<Chain>,
        signer: Address,
    ) -> Self {
        let id = tss_pool_id(&pubkeys, &pool_pub_key, height);
        Self {
            id,
            pool_pub_key,
            keygen_type,
            pubkeys,
            height,
            blame,
            chains,
            signer,
        }
    }
}

/// Report of a threshold signing round that failed with blame.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysignFailMsg {
    /// Hash of height, vault, memo, coins and blame
    pub id: String,
    /// Consensus height of the instruction
    #[serde_as(as = "DisplayFromStr")]
    pub height: i64,
    /// Nodes held responsible
    pub blame: Blame,
    /// Memo of the failed instruction
    pub memo: String,
    /// Coins of the failed instruction
    pub coins: Coins,
    /// Vault that failed to sign
    pub pub_key: PubKey,
    /// Node account address
    pub signer: Address,
}

impl KeysignFailMsg {
    /// Build the report; the id is derived from its content.
    pub fn new(
        height: i64,
        blame: Blame,
        memo: String,
        coins: Coins,
        pub_key: PubKey,
        signer: Address,
    ) -> Self {
        let nodes: Vec<&str> = blame.blame_nodes.iter().map(|n| n.pubkey.as_str()).collect();
        let coins_text: Vec<String> = coins.iter().map(|c| c.to_string()).collect();
        let preimage = format!(
            "{height}|{pub_key}|{memo}|{}|{}",
            coins_text.join(","),
            nodes.join(",")
        );
        Self {
            id: hex::encode_upper(sha256(preimage.as_bytes())),
            height,
            blame,
            memo,
            coins,
            pub_key,
            signer,
        }
    }
}

/// Consensus message union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Msg {
    /// Transfers into a vault
    #[serde(rename = "thorchain/ObservedTxIn")]
    ObservedTxIn(ObservedTxBatch),
    /// Transfers out of a vault
    #[serde(rename = "thorchain/ObservedTxOut")]
    ObservedTxOut(ObservedTxBatch),
    /// Keygen result
    #[serde(rename = "thorchain/MsgTssPool")]
    TssPool(TssPoolMsg),
    /// Failed keysign with blame
    #[serde(rename = "thorchain/MsgTssKeysignFail")]
    KeysignFail(KeysignFailMsg),
}

/// Declared fee of a consensus transaction.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    /// Fee coins (always empty for witness txs)
    pub amount: Coins,
    /// Gas limit
    #[serde_as(as = "DisplayFromStr")]
    pub gas: u64,
}

impl Default for StdFee {
    fn default() -> Self {
        Self {
            amount: Coins::default(),
            gas: WITNESS_GAS,
        }
    }
}

/// Amino-style public key attached to a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdPubKey {
    /// Amino type
    #[serde(rename = "type")]
    pub key_type: String,
    /// base64 compressed key
    pub value: String,
}

/// Signature over a sign doc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignature {
    /// Signing key
    pub pub_key: StdPubKey,
    /// base64 64-byte `r || s`
    pub signature: String,
}

impl StdSignature {
    /// Wrap a raw signature made by `key`.
    pub fn new(key: &Secp256k1PublicKey, signature: &[u8; 64]) -> Self {
        Self {
            pub_key: StdPubKey {
                key_type: PUBKEY_TYPE.to_string(),
                value: BASE64.encode(key.as_bytes()),
            },
            signature: BASE64.encode(signature),
        }
    }
}

/// Unsigned or signed consensus transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdTx {
    /// Messages
    pub msg: Vec<Msg>,
    /// Declared fee
    pub fee: StdFee,
    /// Signatures (empty until broadcast)
    pub signatures: Vec<StdSignature>,
    /// Transaction memo
    pub memo: String,
}

impl StdTx {
    /// Unsigned transaction carrying `msgs` with the witness fee.
    pub fn new(msgs: Vec<Msg>) -> Self {
        Self {
            msg: msgs,
            fee: StdFee::default(),
            signatures: Vec::new(),
            memo: String::new(),
        }
    }
}

/// The document a node signs for one broadcast.
#[serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct StdSignDoc<'a> {
    /// Account number of the node
    #[serde_as(as = "DisplayFromStr")]
    pub account_number: u64,
    /// Consensus network id
    pub chain_id: &'a str,
    /// Declared fee
    pub fee: &'a StdFee,
    /// Transaction memo
    pub memo: &'a str,
    /// Messages
    pub msgs: &'a [Msg],
    /// Account sequence
    #[serde_as(as = "DisplayFromStr")]
    pub sequence: u64,
}

impl<'a> StdSignDoc<'a> {
    /// Sign doc for `tx` at the given account position.
    pub fn new(chain_id: &'a str, account_number: u64, sequence: u64, tx: &'a StdTx) -> Self {
        Self {
            account_number,
            chain_id,
            fee: &tx.fee,
            memo: &tx.memo,
            msgs: &tx.msg,
            sequence,
        }
    }

    /// Canonical bytes to sign.
    pub fn sign_bytes(&self) -> Result<Vec<u8>, BridgeError> {
        let value = serde_json::to_value(self).map_err(|e| BridgeError::decode("sign doc", e))?;
        Ok(canonical_json(&value).into_bytes())
    }
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Uppercase hex sha256 over the sorted members, the pool key and the height.
pub fn tss_pool_id(members: &[PubKey], pool_pub_key: &PubKey, height: i64) -> String {
    let mut sorted: Vec<&str> = members.iter().map(|pk| pk.as_str()).collect();
    sorted.sort_unstable();
    let mut preimage = sorted.concat();
    preimage.push_str(pool_pub_key.as_str());
    preimage.push_str(&height.to_string());
    hex::encode_upper(sha256(preimage.as_bytes()))
}
