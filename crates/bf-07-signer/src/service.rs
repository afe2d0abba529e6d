//! # Signer Service
//!
//! Three tasks share one `Signer`:
//!
//! - the consensus-side `BlockScanner` feeding [`ConsensusBlock`]s,
//! - the dispatcher, which files every instruction into the signing store and
//!   forwards keygen assignments,
//! - the signing loop, which replays every `available` record on each tick
//!   or whenever the dispatcher filed something new.
//!
//! Only the signing loop signs, so a record is never handled by two workers
//! at once.

use bf_01_block_scanner::{BlockScanner, KvScannerStorage};
use bf_02_pubkey_manager::PubKeyValidator;
use bf_03_thorchain_bridge::{BridgeHeightSource, ThorchainBridge};
use bf_04_tss::ThresholdSigner;
use bf_05_chain_clients::{ChainClient, ChainClientError};
use bifrost_telemetry::{names, Metrics};
use parking_lot::Mutex;
use shared_storage::KeyValueStore;
use shared_types::{Blame, Chain, KeygenBlock, MEMO_YGGDRASIL_RETURN};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::adapters::{ConsensusFetcher, KvSignerStore};
use crate::keygen::KeygenCoordinator;
use crate::{
    same_instruction, ConsensusBlock, SignerConfig, SignerError, SignerStorage, TxOutStoreItem,
    TxStatus, SIGNING_TRANSACTION_PERIOD,
};

/// Pending keygen blocks between the dispatcher and the coordinator.
const KEYGEN_QUEUE_CAPACITY: usize = 16;

/// Collaborators the signer is built with.
#[derive(Clone)]
pub struct SignerDeps {
    /// Consensus client
    pub bridge: Arc<dyn ThorchainBridge>,
    /// Vault key registry
    pub registry: Arc<dyn PubKeyValidator>,
    /// Threshold service, used for keygen
    pub tss: Arc<dyn ThresholdSigner>,
    /// Metrics registry
    pub metrics: Arc<Metrics>,
}

/// What happened to one record on a signing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    /// Blamed at a height the consensus scanner has not passed yet
    HeldBack,
    /// The vault is not one this node signs for
    NotSigner,
    /// Completed elsewhere, or nothing to send
    Spent,
    /// This node was not in the signing committee
    NotSelected,
    /// Signed and accepted by the chain
    Broadcast,
}

/// Signs and broadcasts the outbound instructions of this node's vaults.
pub struct Signer {
    config: SignerConfig,
    store: Arc<dyn SignerStorage>,
    bridge: Arc<dyn ThorchainBridge>,
    registry: Arc<dyn PubKeyValidator>,
    chains: HashMap<Chain, Arc<dyn ChainClient>>,
    metrics: Arc<Metrics>,
    keygen: Arc<KeygenCoordinator>,
    scanner: BlockScanner<ConsensusFetcher>,
    position: Arc<AtomicI64>,
    wake: Notify,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Signer {
    /// Signer whose scanner state and signing records live in `db`.
    /// `keygen_chains` are the chains reported for new vaults.
    pub fn new(
        config: SignerConfig,
        db: Arc<dyn KeyValueStore>,
        chains: HashMap<Chain, Arc<dyn ChainClient>>,
        keygen_chains: Vec<Chain>,
        deps: SignerDeps,
    ) -> Result<Self, SignerError> {
        config.validate()?;
        let store: Arc<dyn SignerStorage> =
            Arc::new(KvSignerStore::with_passphrase(Arc::clone(&db), &config.passphrase));
        let fetcher = Arc::new(ConsensusFetcher::new(
            Arc::clone(&deps.bridge),
            Arc::clone(&deps.registry),
        ));
        let scanner = BlockScanner::new(
            config.block_scanner.clone(),
            fetcher,
            Arc::new(KvScannerStorage::new(db)),
            Arc::clone(&deps.metrics),
        )?;
        let keygen = Arc::new(KeygenCoordinator::new(
            Arc::clone(&deps.bridge),
            Arc::clone(&deps.registry),
            deps.tss,
            Arc::clone(&deps.metrics),
            keygen_chains,
        ));
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            position: scanner.position(),
            config,
            store,
            bridge: deps.bridge,
            registry: deps.registry,
            chains,
            metrics: deps.metrics,
            keygen,
            scanner,
            wake: Notify::new(),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Signing store.
    pub fn store(&self) -> &Arc<dyn SignerStorage> {
        &self.store
    }

    /// Last consensus height handed over by the scanner.
    pub fn scan_position(&self) -> i64 {
        self.position.load(Ordering::SeqCst)
    }

    /// Start the consensus scanner, the dispatcher, the keygen consumer and
    /// the signing loop. A second call is a no-op.
    pub async fn start(self: &Arc<Self>) -> Result<(), SignerError> {
        if !self.handles.lock().is_empty() {
            return Ok(());
        }
        let source = BridgeHeightSource(Arc::clone(&self.bridge));
        self.scanner.init_position(Some(&source)).await?;

        let (block_tx, mut block_rx) =
            mpsc::channel::<ConsensusBlock>(self.config.block_scanner.block_scan_processors.max(1));
        let (keygen_tx, mut keygen_rx) = mpsc::channel::<KeygenBlock>(KEYGEN_QUEUE_CAPACITY);

        let signer = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        let dispatcher = tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = block_rx.recv() => match received {
                        Some(block) => {
                            if let Some(keygen) = block.keygen.clone() {
                                if keygen_tx.send(keygen).await.is_err() {
                                    break;
                                }
                            }
                            match signer.process_consensus_block(&block) {
                                Ok(0) => {}
                                Ok(filed) => {
                                    debug!(height = block.height, filed, "[bf-07] Filed instructions");
                                    signer.wake.notify_one();
                                }
                                Err(e) => error!(
                                    height = block.height,
                                    error = %e,
                                    "[bf-07] Failed to file instructions"
                                ),
                            }
                        }
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
            debug!("[bf-07] Dispatcher stopped");
        });

        let keygen = Arc::clone(&self.keygen);
        let mut shutdown = self.shutdown_tx.subscribe();
        let keygen_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = keygen_rx.recv() => match received {
                        Some(block) => tokio::select! {
                            _ = keygen.process_keygen_block(&block) => {}
                            _ = shutdown.changed() => {
                                warn!(height = block.height, "[bf-07] Stopped during keygen");
                                break;
                            }
                        },
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
            debug!("[bf-07] Keygen consumer stopped");
        });

        let signer = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        let signing = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(signer.config.retry_interval) => {}
                    _ = signer.wake.notified() => {}
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }
                // an interrupted pass leaves its records available for the next start
                tokio::select! {
                    result = signer.process_transactions() => {
                        if let Err(e) = result {
                            error!(error = %e, "[bf-07] Failed to process transactions");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("[bf-07] Signing loop stopped");
        });

        self.handles
            .lock()
            .extend([dispatcher, keygen_task, signing]);
        self.scanner.start(block_tx)?;
        info!(position = self.scan_position(), "[bf-07] Signer started");
        Ok(())
    }

    /// Stop the scanner, then every task. Safe to call twice.
    pub async fn stop(&self) {
        debug!("[bf-07] Request to stop signer");
        self.scanner.stop().await;
        self.shutdown_tx.send_replace(true);
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "[bf-07] Signer task panicked");
            }
        }
        info!("[bf-07] Signer stopped");
    }

    /// File the instructions of one consensus height. Records already
    /// present keep their status. Returns how many were new.
    pub fn process_consensus_block(&self, block: &ConsensusBlock) -> Result<usize, SignerError> {
        let mut filed = 0;
        for tx_out in &block.tx_outs {
            for item in &tx_out.tx_array {
                let record = TxOutStoreItem::new(block.height, item.clone());
                let key = record.key();
                if let Some(existing) = self.store.get(&key)? {
                    debug!(key = %key, status = %existing.status, "[bf-07] Instruction already filed");
                    continue;
                }
                self.store.set(&record)?;
                filed += 1;
            }
        }
        Ok(filed)
    }

    /// One signing pass: prune stale records, then sign every `available`
    /// record, one worker per `(chain, vault)` group.
    pub async fn process_transactions(self: &Arc<Self>) -> Result<(), SignerError> {
        let records = self.store.list()?;
        let current = match self.bridge.get_block_height().await {
            Ok(height) => Some(height),
            Err(e) => {
                warn!(error = %e, "[bf-07] Failed to get consensus height, skip pruning");
                None
            }
        };

        let mut groups: BTreeMap<String, Vec<TxOutStoreItem>> = BTreeMap::new();
        for record in records {
            if let Some(current) = current {
                if current - record.height > SIGNING_TRANSACTION_PERIOD {
                    self.prune(&record, current);
                    continue;
                }
            }
            if record.status == TxStatus::Available {
                groups.entry(record.group()).or_default().push(record);
            }
        }

        let permits = Arc::new(Semaphore::new(self.config.workers));
        let mut workers = JoinSet::new();
        for (group, records) in groups {
            let signer = Arc::clone(self);
            let permits = Arc::clone(&permits);
            workers.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                for record in records {
                    if let Err(e) = signer.sign_and_broadcast(&record).await {
                        error!(
                            group = %group,
                            height = record.height,
                            error = %e,
                            "[bf-07] Failed to sign and broadcast"
                        );
                        break;
                    }
                }
            });
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "[bf-07] Signing worker panicked");
            }
        }
        Ok(())
    }

    fn prune(&self, record: &TxOutStoreItem, current: i64) {
        if record.status == TxStatus::Available {
            warn!(
                height = record.height,
                current,
                memo = %record.tx_out_item.memo,
                vault = %record.tx_out_item.vault_pubkey,
                "[bf-07] Instruction expired without being signed"
            );
        }
        if let Err(e) = self.store.remove(&record.key()) {
            error!(key = %record.key(), error = %e, "[bf-07] Failed to remove expired instruction");
        }
    }

    fn update_status(&self, record: &TxOutStoreItem, status: TxStatus) -> Result<(), SignerError> {
        let mut updated = record.clone();
        updated.status = status;
        self.store.set(&updated)
    }

    /// Sign and broadcast one record, updating its status.
    pub async fn sign_and_broadcast(
        &self,
        record: &TxOutStoreItem,
    ) -> Result<SignOutcome, SignerError> {
        let item = &record.tx_out_item;
        let height = record.height;

        if record.blame_height > 0 && self.scan_position() <= record.blame_height {
            debug!(height, blame_height = record.blame_height, "[bf-07] Held back after blame");
            return Ok(SignOutcome::HeldBack);
        }

        let client = self
            .chains
            .get(&item.chain)
            .ok_or_else(|| SignerError::UnsupportedChain(item.chain.clone()))?;

        if !self.registry.get_signers().contains(&item.vault_pubkey) {
            debug!(vault = %item.vault_pubkey, "[bf-07] Not a signer of this vault");
            return Ok(SignOutcome::NotSigner);
        }

        if item.to_address.is_empty() || !item.out_hash.is_empty() {
            info!(height, memo = %item.memo, "[bf-07] Nothing to send, mark as spent");
            self.update_status(record, TxStatus::Spent)?;
            return Ok(SignOutcome::Spent);
        }

        let mut tx = item.clone();
        if tx.memo.trim().eq_ignore_ascii_case(MEMO_YGGDRASIL_RETURN) && tx.coins.is_empty() {
            let address = client.get_address(&tx.vault_pubkey)?;
            let account = client.get_account(&address).await?;
            let coin_count = account.coins.iter().filter(|c| !c.is_zero()).count() as u64;
            let gas = client.gas_for(coin_count);
            let gas_asset = tx.chain.gas_asset();
            tx.coins = account
                .coins
                .saturating_sub_asset(&gas_asset, gas.get(&gas_asset))
                .non_zero();
            debug!(coins = tx.coins.len(), "[bf-07] Resolved yggdrasil return coins");
        }

        let keysign = self.bridge.get_keysign(height, &item.vault_pubkey).await?;
        let done_elsewhere = keysign
            .chains
            .values()
            .flat_map(|out| out.tx_array.iter())
            .any(|other| same_instruction(other, item) && !other.out_hash.is_empty());
        if done_elsewhere {
            info!(height, memo = %item.memo, "[bf-07] Already signed by another node");
            self.update_status(record, TxStatus::Spent)?;
            return Ok(SignOutcome::Spent);
        }

        let chain = tx.chain.as_str().to_string();
        let _timer = self.metrics.start_timer(&names::chain_metric(
            &chain,
            names::SIGN_AND_BROADCAST_DURATION,
        ));

        let payload = match client.sign(&tx, height).await {
            Ok(payload) => payload,
            Err(e) => return Err(self.on_sign_error(record, &tx, e).await),
        };
        if payload.is_empty() {
            debug!(height, memo = %tx.memo, "[bf-07] Not selected to sign");
            self.update_status(record, TxStatus::Processed)?;
            return Ok(SignOutcome::NotSelected);
        }
        self.metrics.chain_counter(&chain, names::TX_SIGNED).inc();

        if let Err(e) = client.broadcast(&tx, &payload).await {
            self.metrics
                .inc_error(names::SIGNER_ERROR, "fail_to_broadcast", &height.to_string());
            return Err(e.into());
        }
        self.update_status(record, TxStatus::Processed)?;
        self.metrics
            .chain_counter(&chain, names::TX_SIGNED_BROADCAST)
            .inc();
        info!(chain = %chain, height, memo = %tx.memo, "[bf-07] Broadcast outbound");
        Ok(SignOutcome::Broadcast)
    }

    async fn on_sign_error(
        &self,
        record: &TxOutStoreItem,
        tx: &shared_types::TxOutItem,
        err: ChainClientError,
    ) -> SignerError {
        let height = record.height;
        let blame = match err.blame() {
            Some(blame) if !blame.is_empty() => blame.clone(),
            _ => {
                self.metrics
                    .inc_error(names::SIGNER_ERROR, "fail_to_sign", &height.to_string());
                return err.into();
            }
        };
        if let Err(e) = self.post_keysign_fail(record, tx, blame).await {
            error!(height, error = %e, "[bf-07] Failed to post keysign failure");
        }
        err.into()
    }

    async fn post_keysign_fail(
        &self,
        record: &TxOutStoreItem,
        tx: &shared_types::TxOutItem,
        blame: Blame,
    ) -> Result<(), SignerError> {
        let current = match self.bridge.get_block_height().await {
            Ok(h) if h > 0 => h,
            _ => record.height,
        };
        warn!(height = current, blame = %blame, "[bf-07] Keysign blamed, reporting");
        let msg = self.bridge.get_keysign_fail_std_tx(
            current,
            blame,
            tx.memo.clone(),
            tx.coins.clone(),
            tx.vault_pubkey.clone(),
        );
        let mut blamed = record.clone();
        blamed.blame_height = current;
        self.store.set(&blamed)?;
        if let Err(e) = self.bridge.broadcast(msg).await {
            self.metrics.inc_error(
                names::SIGNER_ERROR,
                "fail_to_broadcast_keysign_fail",
                &current.to_string(),
            );
            return Err(e.into());
        }
        Ok(())
    }
}
