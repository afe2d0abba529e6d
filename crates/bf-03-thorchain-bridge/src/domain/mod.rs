//! Bridge domain: configuration, wire types, message builders and errors.

pub mod config;
pub mod errors;
pub mod messages;
pub mod responses;

pub use config::{BackOffConfig, ThorchainConfig};
pub use errors::{BridgeError, HttpError};
pub use messages::{
    canonical_json, tss_pool_id, KeysignFailMsg, Msg, ObservedTx, ObservedTxBatch, StdFee,
    StdPubKey, StdSignDoc, StdSignature, StdTx, TssPoolMsg, Tx, WITNESS_GAS,
};
pub use responses::{
    AccountInfo, BroadcastResult, ChainsTxOut, NodeAccount, NodeStatus, PubKeySet, QueryResHeights,
    TxLog,
};
