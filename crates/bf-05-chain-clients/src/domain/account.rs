//! Chain-side view of a vault account.

use serde::{Deserialize, Serialize};
use shared_types::Coins;

/// Balance and replay counter of one address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Next sequence (BNB) or nonce (ETH); 0 for UTXO chains
    pub sequence: u64,
    /// BNB account number; 0 elsewhere
    pub account_number: u64,
    /// Spendable balance in 1e8 units
    pub coins: Coins,
}

impl Account {
    /// Account holding `coins` with no replay counter.
    pub fn with_coins(coins: Coins) -> Self {
        Self {
            coins,
            ..Default::default()
        }
    }
}
