//! # Vault Public Keys
//!
//! Public keys travel as bech32 text (`thorpub1...` / `tthorpub1...`)
//! wrapping an amino-prefixed compressed secp256k1 key. The same key
//! yields a different address on every chain.

use crate::{Address, Chain, ChainNetwork, TypesError};
use serde::{Deserialize, Serialize};
use shared_crypto::{
    bech32_decode, bech32_encode, eth_address, hash160, segwit_v0_encode, Secp256k1PublicKey,
};
use std::fmt;

/// Amino type prefix for a secp256k1 public key.
const AMINO_SECP256K1_PREFIX: [u8; 5] = [0xeb, 0x5a, 0xe9, 0x87, 0x21];

/// Bech32 encoded vault or node public key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PubKey(String);

/// Ordered list of public keys.
pub type PubKeys = Vec<PubKey>;

impl PubKey {
    /// Parse and validate bech32 text.
    pub fn from_bech32(text: &str) -> Result<Self, TypesError> {
        let pk = Self(text.trim().to_string());
        pk.secp256k1()?;
        Ok(pk)
    }

    /// Wrap text without validation. Used for values already validated by
    /// the consensus chain.
    pub fn new_unchecked(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Encode a raw key under the network's pubkey prefix.
    pub fn from_secp256k1(
        key: &Secp256k1PublicKey,
        network: ChainNetwork,
    ) -> Result<Self, TypesError> {
        let mut data = Vec::with_capacity(AMINO_SECP256K1_PREFIX.len() + 33);
        data.extend_from_slice(&AMINO_SECP256K1_PREFIX);
        data.extend_from_slice(key.as_bytes());
        Ok(Self(bech32_encode(network.pubkey_prefix(), &data)?))
    }

    /// Decode the underlying secp256k1 key. The amino prefix is optional.
    pub fn secp256k1(&self) -> Result<Secp256k1PublicKey, TypesError> {
        let (_, data) = bech32_decode(&self.0).map_err(|e| TypesError::InvalidPubKey {
            key: self.0.clone(),
            reason: e.to_string(),
        })?;
        let raw = data
            .strip_prefix(&AMINO_SECP256K1_PREFIX[..])
            .unwrap_or(&data[..]);
        Secp256k1PublicKey::from_slice(raw).map_err(|e| TypesError::InvalidPubKey {
            key: self.0.clone(),
            reason: e.to_string(),
        })
    }

    /// Address controlled by this key on `chain`.
    pub fn get_address(&self, chain: &Chain, network: ChainNetwork) -> Result<Address, TypesError> {
        let key = self.secp256k1()?;
        let address = match chain.as_str() {
            Chain::BNB => bech32_encode(network.bnb_prefix(), &hash160(key.as_bytes()))?,
            Chain::THOR => bech32_encode(network.thor_prefix(), &hash160(key.as_bytes()))?,
            Chain::BTC => segwit_v0_encode(network.btc_hrp(), &hash160(key.as_bytes()))?,
            Chain::ETH => eth_address(&key)?,
            other => return Err(TypesError::UnsupportedChain(other.to_string())),
        };
        Ok(Address::new(address))
    }

    /// Bech32 text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is unset.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
