//! # Observer Service
//!
//! Owns the shared block queue. `start` hands a sender to every chain
//! adapter and spawns the single consumer task; `stop` stops the adapters
//! first, then the consumer.

use bf_02_pubkey_manager::{is_vault_memo, PubKeyValidator};
use bf_03_thorchain_bridge::{ObservedTx, ThorchainBridge};
use bf_05_chain_clients::ChainClient;
use bifrost_telemetry::{names, Metrics};
use parking_lot::Mutex;
use shared_types::{Chain, PubKey, TxIn, TxInItem};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{to_observed_tx, ObserverError, DEFAULT_QUEUE_CAPACITY};

/// Witnesses vault transfers seen by the chain scanners.
pub struct Observer {
    registry: Arc<dyn PubKeyValidator>,
    chains: HashMap<Chain, Arc<dyn ChainClient>>,
    bridge: Arc<dyn ThorchainBridge>,
    metrics: Arc<Metrics>,
    queue_capacity: usize,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Observer {
    /// Observer over `chains`.
    pub fn new(
        registry: Arc<dyn PubKeyValidator>,
        chains: HashMap<Chain, Arc<dyn ChainClient>>,
        bridge: Arc<dyn ThorchainBridge>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            registry,
            chains,
            bridge,
            metrics,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    /// Bound of the shared block queue (`block_scan_processors`).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Start every chain scanner and the consumer task. A second call is a
    /// no-op.
    pub async fn start(self: &Arc<Self>) -> Result<(), ObserverError> {
        if self.handle.lock().is_some() {
            return Ok(());
        }
        let (tx, mut rx) = mpsc::channel::<TxIn>(self.queue_capacity);
        for (chain, client) in &self.chains {
            client
                .start(tx.clone())
                .await
                .map_err(|source| ObserverError::ChainStart {
                    chain: chain.clone(),
                    source,
                })?;
            info!(chain = %chain, "[bf-06] Chain scanner started");
        }
        drop(tx);

        let observer = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        *self.handle.lock() = Some(tokio::spawn(async move {
            debug!("[bf-06] Start to process blocks");
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(tx_in) => {
                            let chain = tx_in.chain.clone();
                            let height = tx_in.block_height;
                            tokio::select! {
                                result = observer.process_tx_in(tx_in) => {
                                    if let Err(e) = result {
                                        error!(error = %e, "[bf-06] Failed to send to thorchain");
                                    }
                                }
                                _ = shutdown.changed() => {
                                    warn!(chain = %chain, height, "[bf-06] Stopped mid-block, scheduling replay");
                                    observer.block_failed(&chain, height);
                                    break;
                                }
                            }
                        }
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
            debug!("[bf-06] Stop to process blocks");
        }));
        Ok(())
    }

    /// Stop the chain scanners, then the consumer task.
    pub async fn stop(&self) {
        debug!("[bf-06] Request to stop observer");
        for client in self.chains.values() {
            client.stop().await;
        }
        self.shutdown_tx.send_replace(true);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "[bf-06] Observer task panicked");
            }
        }
        info!("[bf-06] Observer stopped");
    }

    /// Witness one scanned block. Returns the consensus hash of the witness
    /// transaction, or `None` when nothing in the block concerns a vault.
    ///
    /// The adapter's `on_observed` hook runs for every kept item whether or
    /// not the broadcast succeeded. A failed witness leaves the height
    /// tracked as failed in the chain's scanner store so it is replayed.
    pub async fn process_tx_in(&self, tx_in: TxIn) -> Result<Option<String>, ObserverError> {
        let height = tx_in.block_height.to_string();
        let items = self.filter_observations(&tx_in.chain, &tx_in.tx_array).await;
        let result = self.sign_and_send(&tx_in.chain, &height, &items).await;
        if let Err(e) = &result {
            self.metrics
                .inc_error(names::OBSERVER_ERROR, e.metric_label(), &height);
            self.block_failed(&tx_in.chain, tx_in.block_height);
        }
        match self.chains.get(&tx_in.chain) {
            Some(client) => {
                for item in &items {
                    client.on_observed(item).await;
                }
            }
            None => debug!(chain = %tx_in.chain, "[bf-06] Chain is not supported yet"),
        }
        result
    }

    fn block_failed(&self, chain: &Chain, height: i64) {
        if let Some(client) = self.chains.get(chain) {
            client.on_block_failed(height);
        }
    }

    /// Items of a block that touch a registered vault, each attributed to
    /// that vault. A vault-to-vault transfer appears twice.
    pub async fn filter_observations(&self, chain: &Chain, items: &[TxInItem]) -> Vec<TxInItem> {
        let mut txs = Vec::new();
        let mut refreshed = false;
        for item in items {
            if !self.registry.matched_address(chain, item) {
                continue;
            }
            if let Some(vault) = self.registry.is_valid_vault_address(&item.sender, chain) {
                txs.push(attributed(item, vault));
            }
            match self.registry.is_valid_vault_address(&item.to, chain) {
                Some(vault) => txs.push(attributed(item, vault)),
                // funds moving to a vault this node has not learned about yet
                None if is_vault_memo(&item.memo) => {
                    if !refreshed {
                        debug!(memo = %item.memo, "[bf-06] Unknown recipient vault, refreshing pubkeys");
                        self.registry.fetch_pubkeys().await;
                        refreshed = true;
                    }
                    if let Some(vault) = self.registry.is_valid_vault_address(&item.to, chain) {
                        txs.push(attributed(item, vault));
                    }
                }
                None => {}
            }
        }
        txs
    }

    async fn sign_and_send(
        &self,
        chain: &Chain,
        height: &str,
        items: &[TxInItem],
    ) -> Result<Option<String>, ObserverError> {
        let mut txs: Vec<ObservedTx> = Vec::with_capacity(items.len());
        for item in items {
            match to_observed_tx(chain, item) {
                Ok(observed) => txs.push(observed),
                Err(e) => {
                    warn!(chain = %chain, tx = %item.tx, error = %e, "[bf-06] Dropping unconvertible tx");
                    self.metrics
                        .inc_error(names::OBSERVER_ERROR, e.metric_label(), height);
                }
            }
        }
        if txs.is_empty() {
            debug!(chain = %chain, height, "[bf-06] Nothing to witness");
            return Ok(None);
        }

        let std_tx = self
            .bridge
            .get_observations_std_tx(&txs)
            .map_err(ObserverError::Sign)?;
        let hash = self
            .bridge
            .broadcast(std_tx)
            .await
            .map_err(ObserverError::Send)?;
        info!(
            chain = %chain,
            block = height,
            txs = txs.len(),
            thorchain_hash = %hash,
            "[bf-06] Sign and send to thorchain successfully"
        );
        Ok(Some(hash))
    }
}

fn attributed(item: &TxInItem, vault: PubKey) -> TxInItem {
    TxInItem {
        observed_vault_pubkey: vault,
        ..item.clone()
    }
}
