//! Driven adapters: the per-chain clients and their shared plumbing.

pub mod binance;
pub mod bitcoin;
pub mod ethereum;
pub mod jsonrpc;
pub mod signing;

pub use binance::{BinanceClient, BinanceRpc};
pub use bitcoin::{BitcoinClient, BitcoinRpc};
pub use ethereum::{EthereumClient, EthereumRpc};
pub use jsonrpc::{parse_hex_u64, JsonRpcClient};
pub use signing::VaultSigner;
