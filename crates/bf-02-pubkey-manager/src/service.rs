//! # Public-Key Registry Service
//!
//! Holds the registered keys behind a `parking_lot::RwLock` and keeps them
//! in step with the consensus layer on a timer.

use async_trait::async_trait;
use bifrost_telemetry::{names, Metrics};
use parking_lot::{Mutex, RwLock};
use shared_types::{Address, Chain, ChainNetwork, PubKey, PubKeys};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::{PubKeyEntry, PubKeyManagerError, PubKeyValidator, VaultPubKeySource};

/// Default interval between consensus fetches.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Vault key registry.
pub struct PubKeyManager {
    network: ChainNetwork,
    entries: RwLock<Vec<PubKeyEntry>>,
    source: Arc<dyn VaultPubKeySource>,
    metrics: Arc<Metrics>,
    refresh_interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PubKeyManager {
    /// Empty registry deriving addresses for `network`.
    pub fn new(
        network: ChainNetwork,
        source: Arc<dyn VaultPubKeySource>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            network,
            entries: RwLock::new(Vec::new()),
            source,
            metrics,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    /// Override the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Load the current vault keys, then refresh them periodically.
    ///
    /// The first fetch must succeed; later failures are only counted.
    pub async fn start(self: &Arc<Self>) -> Result<(), PubKeyManagerError> {
        let keys = self.source.get_vault_pubkeys().await?;
        for pk in keys.all() {
            self.add_pubkey(pk.clone(), false);
        }
        info!(count = self.entries.read().len(), "[bf-02] Loaded vault pubkeys");

        let mut guard = self.handle.lock();
        if guard.is_none() {
            let manager = Arc::clone(self);
            let mut shutdown = self.shutdown_tx.subscribe();
            *guard = Some(tokio::spawn(async move {
                debug!("[bf-02] Start to update pubkeys");
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(manager.refresh_interval) => {
                            manager.fetch_pubkeys().await;
                        }
                        _ = shutdown.changed() => break,
                    }
                }
                debug!("[bf-02] Stop to update pubkeys");
            }));
        }
        Ok(())
    }

    /// Stop the refresh loop.
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "[bf-02] Refresh task panicked");
            }
        }
        info!("[bf-02] Pubkey manager stopped");
    }

    fn address_of(&self, pk: &PubKey, chain: &Chain) -> Option<Address> {
        pk.get_address(chain, self.network).ok()
    }
}

#[async_trait]
impl PubKeyValidator for PubKeyManager {
    fn add_pubkey(&self, pk: PubKey, signer: bool) {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.pubkey == pk) {
            Some(entry) => {
                if signer {
                    entry.signer = true;
                }
            }
            None => entries.push(PubKeyEntry::new(pk, signer)),
        }
    }

    fn add_node_pubkey(&self, pk: PubKey) {
        let mut entries = self.entries.write();
        // one node key at a time
        for entry in entries.iter_mut() {
            entry.node_account = entry.pubkey == pk;
        }
        match entries.iter_mut().find(|e| e.pubkey == pk) {
            Some(entry) => {
                entry.signer = true;
                entry.node_account = true;
            }
            None => entries.push(PubKeyEntry {
                pubkey: pk,
                signer: true,
                node_account: true,
            }),
        }
    }

    fn remove_pubkey(&self, pk: &PubKey) {
        self.entries.write().retain(|e| &e.pubkey != pk);
    }

    fn has_pubkey(&self, pk: &PubKey) -> bool {
        self.entries.read().iter().any(|e| &e.pubkey == pk)
    }

    fn get_pubkeys(&self) -> PubKeys {
        self.entries.read().iter().map(|e| e.pubkey.clone()).collect()
    }

    fn get_signers(&self) -> PubKeys {
        self.entries
            .read()
            .iter()
            .filter(|e| e.signer)
            .map(|e| e.pubkey.clone())
            .collect()
    }

    fn get_node_pubkey(&self) -> Option<PubKey> {
        self.entries
            .read()
            .iter()
            .find(|e| e.node_account)
            .map(|e| e.pubkey.clone())
    }

    fn is_valid_vault_address(&self, addr: &Address, chain: &Chain) -> Option<PubKey> {
        if addr.is_empty() {
            return None;
        }
        self.entries
            .read()
            .iter()
            .find(|e| self.address_of(&e.pubkey, chain).as_ref() == Some(addr))
            .map(|e| e.pubkey.clone())
    }

    async fn fetch_pubkeys(&self) {
        match self.source.get_vault_pubkeys().await {
            Ok(keys) => {
                for pk in keys.all() {
                    self.add_pubkey(pk.clone(), false);
                }
            }
            Err(e) => {
                error!(error = %e, "[bf-02] Failed to get pubkeys from thorchain");
                self.metrics
                    .inc_error(names::PUBKEY_MANAGER_ERROR, "fail_to_fetch_pubkeys", "");
            }
        }
    }
}
