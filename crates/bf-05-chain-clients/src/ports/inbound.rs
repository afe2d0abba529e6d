//! Driving Ports (API offered to the observer, the signer and the runtime)

use async_trait::async_trait;
use bf_01_block_scanner::{
    BlockFetcher, BlockScanStatus, BlockScanner, BlockScannerConfig, ConsensusHeightSource, FetchError,
    KvScannerStorage, MockBlockFetcher, ScannerStorage,
};
use bf_02_pubkey_manager::PubKeyValidator;
use bifrost_telemetry::Metrics;
use parking_lot::{Mutex, RwLock};
use shared_storage::InMemoryKVStore;
use shared_types::{Address, Chain, ChainNetwork, Gas, PubKey, TxIn, TxInItem, TxOutItem};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use crate::{Account, ChainClientError};

/// One external chain.
///
/// Implementations own their block scanner and are safe to call from
/// several tasks at once.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain this adapter serves.
    fn get_chain(&self) -> Chain;

    /// Current tip.
    async fn get_height(&self) -> Result<i64, ChainClientError>;

    /// Vault-agnostic view of one block. Heights above the tip fail with
    /// `ChainClientError::HeightNotYetProduced`.
    async fn fetch_block(&self, height: i64) -> Result<TxIn, ChainClientError>;

    /// Address of `pk` on this chain.
    fn get_address(&self, pk: &PubKey) -> Result<Address, ChainClientError>;

    /// Balance and replay counter of `address`.
    async fn get_account(&self, address: &Address) -> Result<Account, ChainClientError>;

    /// Expected fee of a transfer carrying `coin_count` coins.
    fn gas_for(&self, coin_count: u64) -> Gas;

    /// Whether `tx` touches a registered vault.
    fn matched_address(&self, tx: &TxInItem) -> bool;

    /// Build and sign the transfer described by `item`. Empty bytes mean
    /// this node was not selected for the threshold round.
    async fn sign(&self, item: &TxOutItem, height: i64) -> Result<Vec<u8>, ChainClientError>;

    /// Submit a signed payload. A duplicate submission is success.
    async fn broadcast(&self, item: &TxOutItem, payload: &[u8]) -> Result<(), ChainClientError>;

    /// Called once per witnessed item after consensus accepted it.
    async fn on_observed(&self, _tx: &TxInItem) {}

    /// The block at `height` could not be witnessed; track it for replay.
    fn on_block_failed(&self, height: i64);

    /// Initialise the scan position and start scanning into `out`.
    async fn start(&self, out: mpsc::Sender<TxIn>) -> Result<(), ChainClientError>;

    /// Stop scanning and wait for the scanner tasks.
    async fn stop(&self);
}

/// In-memory adapter for tests.
///
/// Blocks come from a [`MockBlockFetcher`] driven by a real
/// [`BlockScanner`] over an in-memory store, so scan position and block
/// status can be inspected. Signing returns the JSON of the instruction
/// unless a scripted outcome is queued.
pub struct MockChainClient {
    chain: Chain,
    network: ChainNetwork,
    fetcher: Arc<MockBlockFetcher>,
    storage: Arc<dyn ScannerStorage>,
    metrics: Arc<Metrics>,
    scanner_config: BlockScannerConfig,
    consensus: Option<Arc<dyn ConsensusHeightSource>>,
    registry: Option<Arc<dyn PubKeyValidator>>,
    scanner: Mutex<Option<Arc<BlockScanner<MockBlockFetcher>>>>,
    accounts: RwLock<HashMap<Address, Account>>,
    gas: RwLock<Gas>,
    sign_script: Mutex<VecDeque<Result<Vec<u8>, ChainClientError>>>,
    sign_delay: RwLock<Duration>,
    signed: RwLock<Vec<TxOutItem>>,
    broadcasts: RwLock<Vec<(TxOutItem, Vec<u8>)>>,
    broadcast_failing: AtomicBool,
    observed: RwLock<Vec<TxInItem>>,
}

impl MockChainClient {
    /// Adapter for `chain` whose mock tip starts at 0.
    pub fn new(chain: Chain, network: ChainNetwork, metrics: Arc<Metrics>) -> Self {
        let storage: Arc<dyn ScannerStorage> =
            Arc::new(KvScannerStorage::new(Arc::new(InMemoryKVStore::new())));
        Self {
            fetcher: Arc::new(MockBlockFetcher::new(chain.clone(), 0)),
            scanner_config: BlockScannerConfig::for_testing(chain.clone()),
            chain,
            network,
            storage,
            metrics,
            consensus: None,
            registry: None,
            scanner: Mutex::new(None),
            accounts: RwLock::new(HashMap::new()),
            gas: RwLock::new(Gas::default()),
            sign_script: Mutex::new(VecDeque::new()),
            sign_delay: RwLock::new(Duration::ZERO),
            signed: RwLock::new(Vec::new()),
            broadcasts: RwLock::new(Vec::new()),
            broadcast_failing: AtomicBool::new(false),
            observed: RwLock::new(Vec::new()),
        }
    }

    /// Decide vault matches through `registry`.
    pub fn with_registry(mut self, registry: Arc<dyn PubKeyValidator>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use `config` for the internal scanner.
    pub fn with_scanner_config(mut self, config: BlockScannerConfig) -> Self {
        self.scanner_config = BlockScannerConfig {
            chain_id: self.chain.clone(),
            ..config
        };
        self
    }

    /// Ask `source` for the start height.
    pub fn with_consensus(mut self, source: Arc<dyn ConsensusHeightSource>) -> Self {
        self.consensus = Some(source);
        self
    }

    /// Block source behind the scanner.
    pub fn fetcher(&self) -> &Arc<MockBlockFetcher> {
        &self.fetcher
    }

    /// Scanner store, for position and status checks.
    pub fn storage(&self) -> &Arc<dyn ScannerStorage> {
        &self.storage
    }

    /// Answer `get_account(address)` with `account`.
    pub fn set_account(&self, address: Address, account: Account) {
        self.accounts.write().insert(address, account);
    }

    /// Answer every `gas_for` with `gas`.
    pub fn set_gas(&self, gas: Gas) {
        *self.gas.write() = gas;
    }

    /// Queue the outcome of the next `sign` call.
    pub fn push_sign_result(&self, result: Result<Vec<u8>, ChainClientError>) {
        self.sign_script.lock().push_back(result);
    }

    /// Hold every signing call for `delay`.
    pub fn set_sign_delay(&self, delay: Duration) {
        *self.sign_delay.write() = delay;
    }

    /// Make every broadcast fail with a transient error.
    pub fn set_broadcast_failing(&self, failing: bool) {
        self.broadcast_failing.store(failing, Ordering::SeqCst);
    }

    /// Instructions passed to `sign`, in call order.
    pub fn signed(&self) -> Vec<TxOutItem> {
        self.signed.read().clone()
    }

    /// Successful broadcasts, in call order.
    pub fn broadcasts(&self) -> Vec<(TxOutItem, Vec<u8>)> {
        self.broadcasts.read().clone()
    }

    /// Items passed to `on_observed`.
    pub fn observed(&self) -> Vec<TxInItem> {
        self.observed.read().clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn get_chain(&self) -> Chain {
        self.chain.clone()
    }

    async fn get_height(&self) -> Result<i64, ChainClientError> {
        self.fetcher
            .get_height()
            .await
            .map_err(|e| ChainClientError::InvalidInstruction(e.to_string()))
    }

    async fn fetch_block(&self, height: i64) -> Result<TxIn, ChainClientError> {
        self.fetcher.fetch_block(height).await.map_err(|e| match e {
            FetchError::HeightNotYetProduced(h) => ChainClientError::HeightNotYetProduced(h),
            FetchError::Failed(message) => ChainClientError::Rpc { code: -1, message },
        })
    }

    fn get_address(&self, pk: &PubKey) -> Result<Address, ChainClientError> {
        Ok(pk.get_address(&self.chain, self.network)?)
    }

    async fn get_account(&self, address: &Address) -> Result<Account, ChainClientError> {
        Ok(self.accounts.read().get(address).cloned().unwrap_or_default())
    }

    fn gas_for(&self, _coin_count: u64) -> Gas {
        self.gas.read().clone()
    }

    fn matched_address(&self, tx: &TxInItem) -> bool {
        self.registry
            .as_ref()
            .map(|r| r.matched_address(&self.chain, tx))
            .unwrap_or(false)
    }

    async fn sign(&self, item: &TxOutItem, _height: i64) -> Result<Vec<u8>, ChainClientError> {
        self.signed.write().push(item.clone());
        let delay = *self.sign_delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(scripted) = self.sign_script.lock().pop_front() {
            return scripted;
        }
        serde_json::to_vec(item).map_err(|e| ChainClientError::decode("instruction", e))
    }

    async fn broadcast(&self, item: &TxOutItem, payload: &[u8]) -> Result<(), ChainClientError> {
        if self.broadcast_failing.load(Ordering::SeqCst) {
            return Err(ChainClientError::Rpc {
                code: -1,
                message: "mock broadcast failure".to_string(),
            });
        }
        self.broadcasts
            .write()
            .push((item.clone(), payload.to_vec()));
        Ok(())
    }

    async fn on_observed(&self, tx: &TxInItem) {
        self.observed.write().push(tx.clone());
    }

    fn on_block_failed(&self, height: i64) {
        let scanner = self.scanner.lock().clone();
        match scanner {
            Some(scanner) => scanner.mark_failed(height),
            None => {
                if let Err(e) = self.storage.set_block_status(height, BlockScanStatus::Failed) {
                    warn!(height, error = %e, "[bf-05] Failed to track failed block");
                }
            }
        }
    }

    async fn start(&self, out: mpsc::Sender<TxIn>) -> Result<(), ChainClientError> {
        let scanner = Arc::new(BlockScanner::new(
            self.scanner_config.clone(),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.storage),
            Arc::clone(&self.metrics),
        )?);
        scanner.init_position(self.consensus.as_deref()).await?;
        scanner.start(out)?;
        *self.scanner.lock() = Some(scanner);
        Ok(())
    }

    async fn stop(&self) {
        let scanner = self.scanner.lock().take();
        if let Some(scanner) = scanner {
            scanner.stop().await;
        }
    }
}
