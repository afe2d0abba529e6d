//! Per-chain fee rules. All results are in 1e8 units of the chain's gas
//! asset.

use crate::{Chain, Coin, Coins};

/// BNB fee for a single-coin transfer.
pub const BNB_SINGLE_TRANSFER_FEE: u64 = 37_500;

/// BNB fee per coin of a multi-coin transfer.
pub const BNB_MULTI_TRANSFER_FEE: u64 = 30_000;

/// Base gas of an Ethereum value transfer.
pub const ETH_TRANSFER_GAS: u64 = 21_000;

/// Gas per non-zero byte of Ethereum calldata.
pub const ETH_GAS_PER_DATA_BYTE: u64 = 68;

/// Fixed fee rate used when building Bitcoin transactions.
pub const BTC_SATS_PER_VBYTE: u64 = 25;

/// Fee for a BNB transfer carrying `coin_count` coins.
pub fn bnb_gas(coin_count: u64) -> Coins {
    let amount = if coin_count <= 1 {
        BNB_SINGLE_TRANSFER_FEE
    } else {
        BNB_MULTI_TRANSFER_FEE.saturating_mul(coin_count)
    };
    Coins::new(vec![Coin::new(Chain::bnb().gas_asset(), amount)])
}

/// Gas units consumed by an Ethereum transfer with `memo_len` bytes of data.
pub fn eth_gas_limit(memo_len: usize) -> u64 {
    ETH_TRANSFER_GAS.saturating_add(ETH_GAS_PER_DATA_BYTE.saturating_mul(memo_len as u64))
}

/// Fee for an Ethereum transfer; `gas_price` is already in 1e8 units.
pub fn eth_gas(gas_price: u64, memo_len: usize) -> Coins {
    let amount = eth_gas_limit(memo_len).saturating_mul(gas_price);
    Coins::new(vec![Coin::new(Chain::eth().gas_asset(), amount)])
}

/// Fee for a Bitcoin transaction of `vbytes` virtual bytes.
pub fn btc_gas(vbytes: u64, sats_per_vbyte: u64) -> Coins {
    Coins::new(vec![Coin::new(
        Chain::btc().gas_asset(),
        vbytes.saturating_mul(sats_per_vbyte),
    )])
}
