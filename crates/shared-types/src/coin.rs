//! # Assets and Coins
//!
//! Amounts are always expressed in 1e8 units regardless of the chain's
//! native precision. Adapters convert at the edge.

use crate::{Chain, TypesError};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// Asset identifier, `CHAIN.SYMBOL` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    /// Chain the asset lives on
    pub chain: Chain,
    /// Uppercase symbol (may carry a `-XXX` token suffix)
    pub symbol: String,
}

impl Asset {
    /// Build an asset; the symbol is uppercased.
    pub fn new(chain: Chain, symbol: &str) -> Self {
        Self {
            chain,
            symbol: symbol.trim().to_ascii_uppercase(),
        }
    }

    /// Whether this is the fee asset of its chain.
    pub fn is_gas_asset(&self) -> bool {
        *self == self.chain.gas_asset()
    }
}

impl FromStr for Asset {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain, symbol) = s
            .split_once('.')
            .ok_or_else(|| TypesError::InvalidAsset(s.to_string()))?;
        if symbol.trim().is_empty() {
            return Err(TypesError::InvalidAsset(s.to_string()));
        }
        Ok(Self::new(Chain::new(chain)?, symbol))
    }
}

impl TryFrom<String> for Asset {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.chain, self.symbol)
    }
}

/// An amount of one asset.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    /// Asset
    pub asset: Asset,
    /// Amount in 1e8 units
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub amount: u64,
}

impl Coin {
    /// Create a coin.
    pub fn new(asset: Asset, amount: u64) -> Self {
        Self { asset, amount }
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.asset)
    }
}

/// Ordered collection of coins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(Vec<Coin>);

/// Fee paid for a transaction.
pub type Gas = Coins;

impl Coins {
    /// Wrap a list of coins.
    pub fn new(coins: Vec<Coin>) -> Self {
        Self(coins)
    }

    /// Amount held of `asset`, zero when absent.
    pub fn get(&self, asset: &Asset) -> u64 {
        self.0
            .iter()
            .filter(|c| &c.asset == asset)
            .map(|c| c.amount)
            .fold(0u64, u64::saturating_add)
    }

    /// True when every amount is zero (or there are no coins).
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(Coin::is_zero)
    }

    /// Subtract `amount` of `asset`, saturating at zero. Other assets are
    /// left untouched.
    pub fn saturating_sub_asset(&self, asset: &Asset, amount: u64) -> Self {
        Self(
            self.0
                .iter()
                .map(|c| {
                    if &c.asset == asset {
                        Coin::new(c.asset.clone(), c.amount.saturating_sub(amount))
                    } else {
                        c.clone()
                    }
                })
                .collect(),
        )
    }

    /// Drop zero-amount entries.
    pub fn non_zero(self) -> Self {
        Self(self.0.into_iter().filter(|c| !c.is_zero()).collect())
    }

    /// Consume into the inner vector.
    pub fn into_inner(self) -> Vec<Coin> {
        self.0
    }
}

impl Deref for Coins {
    type Target = [Coin];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Coin>> for Coins {
    fn from(coins: Vec<Coin>) -> Self {
        Self(coins)
    }
}

impl FromIterator<Coin> for Coins {
    fn from_iter<I: IntoIterator<Item = Coin>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Coins {
    type Item = &'a Coin;
    type IntoIter = std::slice::Iter<'a, Coin>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
