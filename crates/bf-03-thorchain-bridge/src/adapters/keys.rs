//! Node key handle.
//!
//! `<home>/keys/<name>.key` holds the hex of the node's 32-byte secp256k1
//! key. With a passphrase configured the file holds the hex of the key
//! sealed with AES-GCM under `sha256(passphrase)`.

use shared_crypto::{open, seal, sha256, Secp256k1KeyPair, Secp256k1PublicKey, SecretKey};
use shared_types::{Address, Chain, ChainNetwork, PubKey};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{BridgeError, ThorchainConfig};

/// The node's own signing key.
#[derive(Clone)]
pub struct Keys {
    key_pair: Arc<Secp256k1KeyPair>,
    network: ChainNetwork,
}

impl std::fmt::Debug for Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &hex::encode(self.key_pair.public_key().as_bytes()))
            .field("network", &self.network)
            .finish()
    }
}

impl Keys {
    /// Wrap an in-memory key pair.
    pub fn new(key_pair: Secp256k1KeyPair, network: ChainNetwork) -> Self {
        Self {
            key_pair: Arc::new(key_pair),
            network,
        }
    }

    /// Load the key named in `config`.
    pub fn load(config: &ThorchainConfig, network: ChainNetwork) -> Result<Self, BridgeError> {
        let path = key_path(Path::new(&config.chain_home_folder), &config.signer_name);
        let text = fs::read_to_string(&path)
            .map_err(|e| BridgeError::Keys(format!("failed to read {}: {e}", path.display())))?;
        let raw = hex::decode(text.trim())
            .map_err(|e| BridgeError::Keys(format!("{} is not hex: {e}", path.display())))?;
        let secret = if config.signer_passwd.is_empty() {
            raw
        } else {
            open(&SecretKey::from_passphrase(&config.signer_passwd), &raw)
                .map_err(|_| BridgeError::Keys("wrong passphrase for node key".to_string()))?
        };
        let key_pair = Secp256k1KeyPair::from_slice(&secret)
            .map_err(|e| BridgeError::Keys(e.to_string()))?;
        Ok(Self::new(key_pair, network))
    }

    /// Write `key_pair` to `<home>/keys/<name>.key`, sealed when
    /// `passphrase` is non-empty.
    pub fn save(
        home: &Path,
        name: &str,
        passphrase: &str,
        key_pair: &Secp256k1KeyPair,
    ) -> Result<PathBuf, BridgeError> {
        let path = key_path(home, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BridgeError::Keys(e.to_string()))?;
        }
        let secret = key_pair.to_bytes();
        let payload = if passphrase.is_empty() {
            secret.to_vec()
        } else {
            seal(&SecretKey::from_passphrase(passphrase), &secret)
                .map_err(|e| BridgeError::Keys(e.to_string()))?
        };
        fs::write(&path, hex::encode(payload)).map_err(|e| BridgeError::Keys(e.to_string()))?;
        Ok(path)
    }

    /// Raw public key.
    pub fn public_key(&self) -> Secp256k1PublicKey {
        self.key_pair.public_key()
    }

    /// The node pubkey in bech32.
    pub fn pubkey(&self) -> Result<PubKey, BridgeError> {
        Ok(PubKey::from_secp256k1(&self.public_key(), self.network)?)
    }

    /// The node's consensus account address.
    pub fn address(&self) -> Result<Address, BridgeError> {
        Ok(self.pubkey()?.get_address(&Chain::thor(), self.network)?)
    }

    /// Network the addresses are derived for.
    pub fn network(&self) -> ChainNetwork {
        self.network
    }

    /// Underlying key pair, for chain adapters signing with the node key.
    pub fn key_pair(&self) -> &Secp256k1KeyPair {
        &self.key_pair
    }

    /// sha256 of `message`, signed low-S, as 64-byte `r || s`.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; 64], BridgeError> {
        let signature = self
            .key_pair
            .sign_prehash(&sha256(message))
            .map_err(|e| BridgeError::Keys(e.to_string()))?;
        Ok(*signature.as_bytes())
    }
}

fn key_path(home: &Path, name: &str) -> PathBuf {
    home.join("keys").join(format!("{name}.key"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::{is_high_s, Secp256k1Signature};
    use tempfile::TempDir;

    fn config(home: &Path, passwd: &str) -> ThorchainConfig {
        ThorchainConfig {
            chain_home_folder: home.to_string_lossy().into_owned(),
            signer_name: "bifrost".to_string(),
            signer_passwd: passwd.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_key_file() {
        let dir = TempDir::new().unwrap();
        let pair = Secp256k1KeyPair::generate();
        let expected = pair.public_key();
        Keys::save(dir.path(), "bifrost", "", &pair).unwrap();

        let keys = Keys::load(&config(dir.path(), ""), ChainNetwork::Testnet).unwrap();
        assert_eq!(keys.public_key(), expected);
        assert!(keys.address().unwrap().as_str().starts_with("tthor1"));
        assert!(keys.pubkey().unwrap().as_str().starts_with("tthorpub1"));
    }

    #[test]
    fn test_sealed_key_file() {
        let dir = TempDir::new().unwrap();
        let pair = Secp256k1KeyPair::generate();
        let expected = pair.public_key();
        Keys::save(dir.path(), "bifrost", "secret", &pair).unwrap();

        let keys = Keys::load(&config(dir.path(), "secret"), ChainNetwork::Mainnet).unwrap();
        assert_eq!(keys.public_key(), expected);
        assert!(keys.address().unwrap().as_str().starts_with("thor1"));

        let err = Keys::load(&config(dir.path(), "wrong"), ChainNetwork::Mainnet).unwrap_err();
        assert!(matches!(err, BridgeError::Keys(_)));
    }

    #[test]
    fn test_missing_key_file() {
        let dir = TempDir::new().unwrap();
        let err = Keys::load(&config(dir.path(), ""), ChainNetwork::Testnet).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_sign_is_low_s_and_verifies() {
        let keys = Keys::new(Secp256k1KeyPair::generate(), ChainNetwork::Testnet);
        let signature = keys.sign(b"sign doc").unwrap();
        let parsed = Secp256k1Signature::from_bytes(signature);
        assert!(!is_high_s(&parsed.s()));
        assert!(keys
            .public_key()
            .verify_prehash(&sha256(b"sign doc"), &parsed)
            .is_ok());
    }
}
