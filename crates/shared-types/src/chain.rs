//! # Chain Tags
//!
//! A chain is identified by a short uppercase tag (`THOR`, `BNB`, `BTC`,
//! `ETH`). Input is accepted in any case and canonicalised to uppercase.

use crate::{Asset, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Symbolic chain identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Chain(String);

impl Chain {
    /// The consensus chain itself.
    pub const THOR: &'static str = "THOR";
    /// Binance Chain.
    pub const BNB: &'static str = "BNB";
    /// Bitcoin.
    pub const BTC: &'static str = "BTC";
    /// Ethereum.
    pub const ETH: &'static str = "ETH";

    /// Parse and canonicalise a chain tag.
    pub fn new(tag: &str) -> Result<Self, TypesError> {
        let tag = tag.trim().to_ascii_uppercase();
        if tag.len() < 3 {
            return Err(TypesError::InvalidChain {
                tag,
                reason: "chain id len is less than 3",
            });
        }
        if tag.len() > 10 {
            return Err(TypesError::InvalidChain {
                tag,
                reason: "chain id len is more than 10",
            });
        }
        if !tag.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(TypesError::InvalidChain {
                tag,
                reason: "chain id can consist only of letters",
            });
        }
        Ok(Self(tag))
    }

    /// `THOR`
    pub fn thor() -> Self {
        Self(Self::THOR.to_string())
    }

    /// `BNB`
    pub fn bnb() -> Self {
        Self(Self::BNB.to_string())
    }

    /// `BTC`
    pub fn btc() -> Self {
        Self(Self::BTC.to_string())
    }

    /// `ETH`
    pub fn eth() -> Self {
        Self(Self::ETH.to_string())
    }

    /// Canonical tag.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the consensus chain.
    pub fn is_thor(&self) -> bool {
        self.0 == Self::THOR
    }

    /// Case-insensitive comparison against raw text.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }

    /// The asset fees are paid in.
    pub fn gas_asset(&self) -> Asset {
        let symbol = match self.0.as_str() {
            Self::THOR => "RUNE",
            other => other,
        };
        Asset::new(self.clone(), symbol)
    }
}

impl Default for Chain {
    fn default() -> Self {
        Chain::thor()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Chain {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Chain {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Chain> for String {
    fn from(chain: Chain) -> Self {
        chain.0
    }
}

/// Network flavour selected by the `NET` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainNetwork {
    /// Production networks.
    Mainnet,
    /// Public test networks.
    #[default]
    Testnet,
    /// Local regression networks.
    Mocknet,
}

impl ChainNetwork {
    /// Read `NET`; unset or unknown values fall back to testnet.
    pub fn from_env() -> Self {
        match std::env::var("NET") {
            Ok(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(net = %value, "Unknown NET value, using testnet");
                ChainNetwork::Testnet
            }),
            Err(_) => ChainNetwork::Testnet,
        }
    }

    /// bech32 prefix for Binance Chain accounts.
    pub fn bnb_prefix(&self) -> &'static str {
        match self {
            ChainNetwork::Mainnet => "bnb",
            _ => "tbnb",
        }
    }

    /// bech32 prefix for consensus-chain accounts.
    pub fn thor_prefix(&self) -> &'static str {
        match self {
            ChainNetwork::Mainnet => "thor",
            _ => "tthor",
        }
    }

    /// bech32 prefix for consensus-chain public keys.
    pub fn pubkey_prefix(&self) -> &'static str {
        match self {
            ChainNetwork::Mainnet => "thorpub",
            _ => "tthorpub",
        }
    }

    /// Segwit human-readable part for Bitcoin.
    pub fn btc_hrp(&self) -> &'static str {
        match self {
            ChainNetwork::Mainnet => "bc",
            ChainNetwork::Testnet => "tb",
            ChainNetwork::Mocknet => "bcrt",
        }
    }
}

impl FromStr for ChainNetwork {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(ChainNetwork::Mainnet),
            "testnet" => Ok(ChainNetwork::Testnet),
            "mocknet" => Ok(ChainNetwork::Mocknet),
            other => Err(TypesError::UnknownNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for ChainNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainNetwork::Mainnet => "mainnet",
            ChainNetwork::Testnet => "testnet",
            ChainNetwork::Mocknet => "mocknet",
        };
        f.write_str(name)
    }
}
