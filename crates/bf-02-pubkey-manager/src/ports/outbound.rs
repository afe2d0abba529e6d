//! Driven Ports (what the registry needs from the consensus layer)

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{PubKeyManagerError, VaultPubKeys};

/// Source of the current vault key list (`/thorchain/vaults/pubkeys`).
#[async_trait]
pub trait VaultPubKeySource: Send + Sync {
    /// Asgard and yggdrasil keys currently known to consensus.
    async fn get_vault_pubkeys(&self) -> Result<VaultPubKeys, PubKeyManagerError>;
}

/// Mock vault key source for testing.
#[derive(Default)]
pub struct MockVaultPubKeySource {
    keys: RwLock<VaultPubKeys>,
    should_fail: RwLock<bool>,
    calls: AtomicUsize,
}

impl MockVaultPubKeySource {
    /// Source returning `keys`.
    pub fn new(keys: VaultPubKeys) -> Self {
        Self {
            keys: RwLock::new(keys),
            ..Default::default()
        }
    }

    /// Replace the returned keys.
    pub fn set_keys(&self, keys: VaultPubKeys) {
        *self.keys.write() = keys;
    }

    /// Make every call fail.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.write() = fail;
    }

    /// Number of fetches served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VaultPubKeySource for MockVaultPubKeySource {
    async fn get_vault_pubkeys(&self) -> Result<VaultPubKeys, PubKeyManagerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.should_fail.read() {
            return Err(PubKeyManagerError::FetchFailed("mock failure".to_string()));
        }
        Ok(self.keys.read().clone())
    }
}
