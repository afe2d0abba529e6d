//! Ethereum adapter over the node's JSON-RPC 2.0 interface.
//!
//! Only native ETH transfers are observed and sent. Amounts are converted
//! from wei to 1e8 units; the memo is the transaction calldata.

pub mod tx;

pub use tx::{e8_to_wei, parse_address, wei_to_e8, LegacyTx, WEI_PER_E8};

use async_trait::async_trait;
use bf_01_block_scanner::{BlockFetcher, BlockScanner, FetchError, KvScannerStorage};
use bf_02_pubkey_manager::PubKeyValidator;
use bf_03_thorchain_bridge::{BridgeHeightSource, ThorchainBridge};
use bifrost_telemetry::{names, HistogramTimer, Metrics};
use parking_lot::RwLock;
use primitive_types::U256;
use serde::Deserialize;
use serde_json::json;
use shared_crypto::{CryptoError, Secp256k1Signature};
use shared_storage::KeyValueStore;
use shared_types::gas::{eth_gas, eth_gas_limit};
use shared_types::{
    Address, Asset, Chain, ChainNetwork, Coin, Coins, Gas, PubKey, TxIn, TxInItem, TxOutItem,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::adapters::{parse_hex_u64, JsonRpcClient, VaultSigner};
use crate::{Account, ChainClient, ChainClientDeps, ChainClientError, ChainConfiguration};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EthBlock {
    #[serde(default)]
    transactions: Vec<EthTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EthTransaction {
    hash: String,
    from: String,
    #[serde(default)]
    to: Option<String>,
    value: U256,
    gas: U256,
    gas_price: U256,
    #[serde(default)]
    input: String,
}

/// Block source over JSON-RPC. Caches the tip, the gas price of the last
/// fetched block and the chain id.
pub struct EthereumRpc {
    chain: Chain,
    rpc: JsonRpcClient,
    tip: AtomicI64,
    gas_price: AtomicU64,
    chain_id: RwLock<Option<u64>>,
    metrics: Arc<Metrics>,
}

impl EthereumRpc {
    /// RPC client for `config`.
    pub fn new(config: &ChainConfiguration, metrics: Arc<Metrics>) -> Result<Self, ChainClientError> {
        Ok(Self {
            chain: config.chain_id.clone(),
            rpc: JsonRpcClient::new(config.http_client()?, "2.0"),
            tip: AtomicI64::new(0),
            gas_price: AtomicU64::new(1),
            chain_id: RwLock::new(None),
            metrics,
        })
    }

    async fn tip(&self) -> Result<i64, ChainClientError> {
        let hex: String = self.rpc.call("eth_blockNumber", json!([])).await?;
        let tip = i64::try_from(parse_hex_u64(&hex)?)
            .map_err(|e| ChainClientError::decode("block number", e))?;
        self.tip.store(tip, Ordering::SeqCst);
        Ok(tip)
    }

    /// EIP-155 chain id.
    pub async fn chain_id(&self) -> Result<u64, ChainClientError> {
        if let Some(id) = *self.chain_id.read() {
            return Ok(id);
        }
        let hex: String = self.rpc.call("eth_chainId", json!([])).await?;
        let id = parse_hex_u64(&hex)?;
        *self.chain_id.write() = Some(id);
        Ok(id)
    }

    /// Gas price in 1e8 units as of the last fetched block.
    pub fn gas_price(&self) -> u64 {
        self.gas_price.load(Ordering::SeqCst)
    }

    async fn refresh_gas_price(&self) -> Result<u64, ChainClientError> {
        let wei: U256 = self.rpc.call("eth_gasPrice", json!([])).await?;
        let price = wei_to_e8(wei).max(1);
        self.gas_price.store(price, Ordering::SeqCst);
        Ok(price)
    }

    /// Pending nonce of `address`.
    pub async fn nonce(&self, address: &Address) -> Result<u64, ChainClientError> {
        let hex: String = self
            .rpc
            .call("eth_getTransactionCount", json!([address.as_str(), "pending"]))
            .await?;
        parse_hex_u64(&hex)
    }

    async fn balance(&self, address: &Address) -> Result<U256, ChainClientError> {
        self.rpc
            .call("eth_getBalance", json!([address.as_str(), "latest"]))
            .await
    }

    async fn block(&self, height: i64) -> Result<TxIn, ChainClientError> {
        if height > self.tip.load(Ordering::SeqCst) && height > self.tip().await? {
            return Err(ChainClientError::HeightNotYetProduced(height));
        }
        let _timer = HistogramTimer::new(
            &self
                .metrics
                .chain_histogram(self.chain.as_str(), names::SEARCH_TX_DURATION),
        );
        let block: Option<EthBlock> = self
            .rpc
            .call("eth_getBlockByNumber", json!([format!("{height:#x}"), true]))
            .await?;
        let block = block.ok_or(ChainClientError::HeightNotYetProduced(height))?;
        if let Err(e) = self.refresh_gas_price().await {
            warn!(chain = %self.chain, error = %e, "[bf-05] Failed to refresh gas price");
        }

        let mut tx_in = TxIn::empty(self.chain.clone(), height);
        if block.transactions.is_empty() {
            self.metrics
                .chain_counter(self.chain.as_str(), names::BLOCK_WITHOUT_TX)
                .inc();
            return Ok(tx_in);
        }
        tx_in.tx_array = block
            .transactions
            .iter()
            .filter_map(|tx| to_tx_in_item(height, tx))
            .collect();
        let suffix = if tx_in.tx_array.is_empty() {
            names::BLOCK_NO_TX_IN
        } else {
            names::BLOCK_WITH_TX_IN
        };
        self.metrics.chain_counter(self.chain.as_str(), suffix).inc();
        Ok(tx_in)
    }

    /// Submit signed RLP bytes. "already known" and "nonce too low" mean
    /// the transaction was seen before.
    pub async fn send_raw(&self, payload: &[u8]) -> Result<(), ChainClientError> {
        let raw = format!("0x{}", hex::encode(payload));
        match self
            .rpc
            .call::<String>("eth_sendRawTransaction", json!([raw]))
            .await
        {
            Ok(hash) => {
                info!(chain = %self.chain, hash = %hash, "[bf-05] Broadcast to ETH");
                Ok(())
            }
            Err(ChainClientError::Rpc { message, .. })
                if message.contains("already known") || message.contains("nonce too low") =>
            {
                info!(chain = %self.chain, reason = %message, "[bf-05] Tx already broadcast");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn to_tx_in_item(height: i64, tx: &EthTransaction) -> Option<TxInItem> {
    let to = tx.to.as_ref()?;
    let input = hex::decode(tx.input.trim_start_matches("0x")).unwrap_or_default();
    if tx.value.is_zero() && input.is_empty() {
        return None;
    }
    let fee = tx.gas.saturating_mul(tx.gas_price);
    let eth = Chain::eth().gas_asset();
    Some(TxInItem {
        block_height: height,
        tx: tx.hash.clone(),
        memo: String::from_utf8(input).unwrap_or_default(),
        sender: Address::new(tx.from.clone()),
        to: Address::new(to.clone()),
        coins: Coins::new(vec![Coin::new(eth.clone(), wei_to_e8(tx.value))]),
        gas: Coins::new(vec![Coin::new(eth, wei_to_e8(fee))]),
        observed_vault_pubkey: PubKey::default(),
    })
}

#[async_trait]
impl BlockFetcher for EthereumRpc {
    type Block = TxIn;

    fn chain(&self) -> Chain {
        self.chain.clone()
    }

    async fn get_height(&self) -> Result<i64, FetchError> {
        Ok(self.tip().await?)
    }

    async fn fetch_block(&self, height: i64) -> Result<TxIn, FetchError> {
        Ok(self.block(height).await?)
    }

    fn is_empty(block: &TxIn) -> bool {
        block.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct NonceCache {
    block_height: i64,
    nonce: u64,
}

/// Ethereum adapter.
pub struct EthereumClient {
    chain: Chain,
    network: ChainNetwork,
    rpc: Arc<EthereumRpc>,
    scanner: BlockScanner<EthereumRpc>,
    bridge: Arc<dyn ThorchainBridge>,
    registry: Arc<dyn PubKeyValidator>,
    signer: VaultSigner,
    nonces: Mutex<HashMap<Address, NonceCache>>,
}

impl EthereumClient {
    /// Adapter for `config`; the scanner store lives in `db`.
    pub fn new(
        config: &ChainConfiguration,
        deps: &ChainClientDeps,
        db: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ChainClientError> {
        config.validate()?;
        let rpc = Arc::new(EthereumRpc::new(config, Arc::clone(&deps.metrics))?);
        let scanner = BlockScanner::new(
            config.scanner_config(),
            Arc::clone(&rpc),
            Arc::new(KvScannerStorage::new(db)),
            Arc::clone(&deps.metrics),
        )?;
        Ok(Self {
            chain: config.chain_id.clone(),
            network: deps.keys.network(),
            rpc,
            scanner,
            bridge: Arc::clone(&deps.bridge),
            registry: Arc::clone(&deps.registry),
            signer: deps.vault_signer(),
            nonces: Mutex::new(HashMap::new()),
        })
    }

    /// Underlying RPC client.
    pub fn rpc(&self) -> &Arc<EthereumRpc> {
        &self.rpc
    }
}

#[async_trait]
impl ChainClient for EthereumClient {
    fn get_chain(&self) -> Chain {
        self.chain.clone()
    }

    async fn get_height(&self) -> Result<i64, ChainClientError> {
        self.rpc.tip().await
    }

    async fn fetch_block(&self, height: i64) -> Result<TxIn, ChainClientError> {
        self.rpc.block(height).await
    }

    fn get_address(&self, pk: &PubKey) -> Result<Address, ChainClientError> {
        Ok(pk.get_address(&Chain::eth(), self.network)?)
    }

    async fn get_account(&self, address: &Address) -> Result<Account, ChainClientError> {
        let nonce = self.rpc.nonce(address).await?;
        let balance = wei_to_e8(self.rpc.balance(address).await?);
        Ok(Account {
            sequence: nonce,
            account_number: 0,
            coins: Coins::new(vec![Coin::new(Chain::eth().gas_asset(), balance)]).non_zero(),
        })
    }

    fn gas_for(&self, _coin_count: u64) -> Gas {
        eth_gas(self.rpc.gas_price(), 0)
    }

    fn matched_address(&self, tx: &TxInItem) -> bool {
        self.registry.matched_address(&self.chain, tx)
    }

    async fn sign(&self, item: &TxOutItem, _height: i64) -> Result<Vec<u8>, ChainClientError> {
        let to = parse_address(item.to_address.as_str())?;
        let eth: Asset = Chain::eth().gas_asset();
        if let Some(other) = item.coins.iter().find(|c| c.asset != eth) {
            return Err(ChainClientError::InvalidInstruction(format!(
                "{} cannot be sent on ETH",
                other.asset
            )));
        }
        let amount = item.coins.get(&eth);
        if amount == 0 {
            return Err(ChainClientError::InvalidInstruction(
                "nothing to send".to_string(),
            ));
        }

        let from = self.get_address(&item.vault_pubkey)?;
        let mut nonces = self.nonces.lock().await;
        let tip = self.rpc.tip().await?;
        let cached = nonces.get(&from).copied().unwrap_or_default();
        let state = if tip > cached.block_height {
            NonceCache {
                block_height: tip,
                nonce: self.rpc.nonce(&from).await?.max(cached.nonce),
            }
        } else {
            cached
        };
        nonces.insert(from, state);

        let chain_id = self.rpc.chain_id().await?;
        let tx = LegacyTx {
            nonce: state.nonce,
            gas_price: e8_to_wei(self.rpc.gas_price()),
            gas_limit: eth_gas_limit(item.memo.len()),
            to,
            value: e8_to_wei(amount),
            data: item.memo.as_bytes().to_vec(),
        };
        let digest = tx.sighash(chain_id);
        debug!(vault = %item.vault_pubkey, nonce = tx.nonce, chain_id, "[bf-05] Signing ETH tx");

        let Some(signature) = self.signer.sign_digest(&item.vault_pubkey, &digest).await? else {
            return Ok(Vec::new());
        };
        let recovery_id = item
            .vault_pubkey
            .secp256k1()?
            .recovery_id(&digest, &Secp256k1Signature::from_bytes(signature))
            .ok_or(CryptoError::InvalidSignature)?;
        Ok(tx.encode_signed(chain_id, &signature, recovery_id))
    }

    async fn broadcast(&self, item: &TxOutItem, payload: &[u8]) -> Result<(), ChainClientError> {
        let from = self.get_address(&item.vault_pubkey)?;
        let mut nonces = self.nonces.lock().await;
        self.rpc.send_raw(payload).await?;
        if let Some(state) = nonces.get_mut(&from) {
            state.nonce += 1;
        }
        Ok(())
    }

    fn on_block_failed(&self, height: i64) {
        self.scanner.mark_failed(height);
    }

    async fn start(&self, out: mpsc::Sender<TxIn>) -> Result<(), ChainClientError> {
        match self.rpc.chain_id().await {
            Ok(id) => info!(chain = %self.chain, chain_id = id, "[bf-05] Connected to ETH node"),
            Err(e) => warn!(chain = %self.chain, error = %e, "[bf-05] Failed to read chain id"),
        }
        let source = BridgeHeightSource(Arc::clone(&self.bridge));
        self.scanner.init_position(Some(&source)).await?;
        self.scanner.start(out)?;
        Ok(())
    }

    async fn stop(&self) {
        self.scanner.stop().await;
    }
}
