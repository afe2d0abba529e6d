//! Binance Chain adapter.
//!
//! Blocks come from the Tendermint RPC (`/status`, `/block`, `/tx`), account
//! state from the node's REST API, and signed transfers are posted to
//! `/api/v1/broadcast`. Transactions are read from and written as their
//! JSON view.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bf_01_block_scanner::{BlockFetcher, BlockScanner, FetchError, KvScannerStorage};
use bf_02_pubkey_manager::PubKeyValidator;
use bf_03_thorchain_bridge::{
    canonical_json, BridgeHeightSource, HttpError, RetryingHttpClient, ThorchainBridge,
};
use bifrost_telemetry::{names, HistogramTimer, Metrics};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use shared_crypto::{bech32_decode, sha256};
use shared_storage::KeyValueStore;
use shared_types::gas::bnb_gas;
use shared_types::{
    Address, Asset, Chain, ChainNetwork, Coin, Coins, Gas, PubKey, TxIn, TxInItem, TxOutItem,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::adapters::VaultSigner;
use crate::{Account, ChainClient, ChainClientDeps, ChainClientError, ChainConfiguration};

/// Network name reported by the Binance Chain testnet.
pub const BNB_TESTNET_NETWORK: &str = "Binance-Chain-Nile";

const SEND_MSG_TYPE: &str = "cosmos-sdk/Send";
const STD_TX_TYPE: &str = "auth/StdTx";
const BROADCAST_SOURCE: u64 = 0;

#[derive(Debug, Deserialize)]
struct StatusResp {
    result: StatusResult,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    node_info: NodeInfo,
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    network: String,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct SyncInfo {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    latest_block_height: i64,
}

#[derive(Debug, Deserialize)]
struct BlockResp {
    #[serde(default)]
    result: Option<BlockResult>,
}

#[derive(Debug, Deserialize)]
struct BlockResult {
    #[serde(default)]
    block: Option<Block>,
}

#[derive(Debug, Deserialize)]
struct Block {
    data: BlockData,
}

#[derive(Debug, Deserialize)]
struct BlockData {
    #[serde(default)]
    txs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TxResp {
    result: TxResult,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    tx: StdTxView,
    #[serde(default)]
    tx_result: DeliverResult,
}

#[derive(Debug, Default, Deserialize)]
struct DeliverResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
}

/// JSON view of a Binance `StdTx`.
#[derive(Debug, Clone, Deserialize)]
pub struct StdTxView {
    /// Amino type name
    #[serde(rename = "type", default)]
    pub tx_type: String,
    /// Body
    pub value: StdTxBody,
}

/// Body of [`StdTxView`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StdTxBody {
    /// Messages
    #[serde(default)]
    pub msg: Vec<TypedMsg>,
    /// Memo
    #[serde(default)]
    pub memo: String,
}

/// Amino-tagged message.
#[derive(Debug, Clone, Deserialize)]
pub struct TypedMsg {
    /// Amino type name
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Message body
    pub value: Value,
}

#[derive(Debug, Deserialize)]
struct SendMsg {
    inputs: Vec<InOut>,
    outputs: Vec<InOut>,
}

#[derive(Debug, Deserialize)]
struct InOut {
    address: String,
    #[serde(default)]
    coins: Vec<BnbCoin>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct BnbCoin {
    denom: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    amount: u64,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct AccountResp {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    account_number: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    sequence: u64,
    #[serde(default)]
    balances: Vec<Balance>,
}

#[derive(Debug, Deserialize)]
struct Balance {
    symbol: String,
    free: String,
}

#[derive(Debug, Deserialize)]
struct BroadcastItem {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    hash: String,
    #[serde(default)]
    log: String,
}

/// Block source over the Tendermint RPC.
pub struct BinanceRpc {
    chain: Chain,
    http: RetryingHttpClient,
    tip: AtomicI64,
    network_id: RwLock<String>,
    metrics: Arc<Metrics>,
}

impl BinanceRpc {
    /// RPC client for `config`.
    pub fn new(config: &ChainConfiguration, metrics: Arc<Metrics>) -> Result<Self, ChainClientError> {
        Ok(Self {
            chain: config.chain_id.clone(),
            http: config.http_client()?,
            tip: AtomicI64::new(0),
            network_id: RwLock::new(String::new()),
            metrics,
        })
    }

    async fn status(&self) -> Result<StatusResult, ChainClientError> {
        let body = self.http.get("/status").await?;
        let resp: StatusResp =
            serde_json::from_str(&body).map_err(|e| ChainClientError::decode("status", e))?;
        *self.network_id.write() = resp.result.node_info.network.clone();
        self.tip
            .store(resp.result.sync_info.latest_block_height, Ordering::SeqCst);
        Ok(resp.result)
    }

    /// Network name used as the sign-doc chain id.
    pub async fn network_id(&self) -> Result<String, ChainClientError> {
        let cached = self.network_id.read().clone();
        if !cached.is_empty() {
            return Ok(cached);
        }
        Ok(self.status().await?.node_info.network)
    }

    /// Whether the node reports the testnet.
    pub async fn is_testnet(&self) -> Result<bool, ChainClientError> {
        Ok(self.network_id().await? == BNB_TESTNET_NETWORK)
    }

    async fn tip(&self) -> Result<i64, ChainClientError> {
        Ok(self.status().await?.sync_info.latest_block_height)
    }

    async fn ensure_produced(&self, height: i64) -> Result<(), ChainClientError> {
        if height <= self.tip.load(Ordering::SeqCst) {
            return Ok(());
        }
        if height > self.tip().await? {
            return Err(ChainClientError::HeightNotYetProduced(height));
        }
        Ok(())
    }

    async fn block(&self, height: i64) -> Result<TxIn, ChainClientError> {
        self.ensure_produced(height).await?;
        let _timer = HistogramTimer::new(
            &self
                .metrics
                .chain_histogram(self.chain.as_str(), names::SEARCH_TX_DURATION),
        );

        let body = self.http.get(&format!("/block?height={height}")).await?;
        let resp: BlockResp =
            serde_json::from_str(&body).map_err(|e| ChainClientError::decode("block", e))?;
        let block = resp
            .result
            .and_then(|r| r.block)
            .ok_or(ChainClientError::HeightNotYetProduced(height))?;

        let raw_txs = block.data.txs.unwrap_or_default();
        let mut tx_in = TxIn::empty(self.chain.clone(), height);
        if raw_txs.is_empty() {
            self.metrics
                .chain_counter(self.chain.as_str(), names::BLOCK_WITHOUT_TX)
                .inc();
            return Ok(tx_in);
        }

        for raw in raw_txs {
            let hash = tx_hash(&raw)?;
            let items = self.tx_items(&hash, height).await?;
            if !items.is_empty() {
                debug!(chain = %self.chain, height, hash = %hash, "[bf-05] Got transfer");
            }
            tx_in.tx_array.extend(items);
        }
        let suffix = if tx_in.tx_array.is_empty() {
            names::BLOCK_NO_TX_IN
        } else {
            names::BLOCK_WITH_TX_IN
        };
        self.metrics.chain_counter(self.chain.as_str(), suffix).inc();
        Ok(tx_in)
    }

    async fn tx_items(&self, hash: &str, height: i64) -> Result<Vec<TxInItem>, ChainClientError> {
        let body = self.http.get(&format!("/tx?hash=0x{hash}")).await?;
        let resp: TxResp =
            serde_json::from_str(&body).map_err(|e| ChainClientError::decode("tx", e))?;
        if resp.result.tx_result.code != 0 {
            debug!(
                hash,
                code = resp.result.tx_result.code,
                log = %resp.result.tx_result.log,
                "[bf-05] Skipping failed tx"
            );
            return Ok(Vec::new());
        }
        from_std_tx(hash, height, &resp.result.tx)
    }

    /// Account number, sequence and balances of `address`. An unknown
    /// account is empty.
    pub async fn account(&self, address: &Address) -> Result<Account, ChainClientError> {
        let body = match self.http.get(&format!("/api/v1/account/{address}")).await {
            Ok(body) => body,
            Err(e) if e.status() == Some(404) => return Ok(Account::default()),
            Err(e) => return Err(e.into()),
        };
        let resp: AccountResp =
            serde_json::from_str(&body).map_err(|e| ChainClientError::decode("account", e))?;
        let coins = resp
            .balances
            .iter()
            .map(|b| {
                parse_fixed8(&b.free).map(|amount| Coin::new(Asset::new(Chain::bnb(), &b.symbol), amount))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Account {
            sequence: resp.sequence,
            account_number: resp.account_number,
            coins: Coins::new(coins).non_zero(),
        })
    }

    /// Post a hex-encoded signed tx. Duplicate submissions are success.
    pub async fn broadcast_hex(&self, payload: &[u8]) -> Result<(), ChainClientError> {
        let result = self
            .http
            .post_body("/api/v1/broadcast?sync=true", "text/plain", payload.to_vec())
            .await;
        let body = match result {
            Ok(body) => body,
            Err(HttpError::Status { body, .. }) if is_duplicate(&body) => {
                info!(chain = %self.chain, "[bf-05] Tx already broadcast");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let items: Vec<BroadcastItem> =
            serde_json::from_str(&body).map_err(|e| ChainClientError::decode("broadcast", e))?;
        for item in items {
            if item.code != 0 && !is_duplicate(&item.log) {
                return Err(ChainClientError::Rpc {
                    code: i64::from(item.code),
                    message: item.log,
                });
            }
            info!(chain = %self.chain, hash = %item.hash, "[bf-05] Broadcast to BNB");
        }
        Ok(())
    }
}

#[async_trait]
impl BlockFetcher for BinanceRpc {
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

/// Uppercase hex sha256 of a base64 raw tx, as Tendermint indexes it.
pub fn tx_hash(raw_base64: &str) -> Result<String, ChainClientError> {
    let raw = BASE64
        .decode(raw_base64.as_bytes())
        .map_err(|e| ChainClientError::decode("raw tx", e))?;
    Ok(hex::encode_upper(sha256(&raw)))
}

/// Transfers of a `StdTx`: first input is the sender, first output the
/// recipient, every output coin is counted.
pub fn from_std_tx(
    hash: &str,
    height: i64,
    tx: &StdTxView,
) -> Result<Vec<TxInItem>, ChainClientError> {
    if !tx.tx_type.is_empty() && tx.tx_type != STD_TX_TYPE {
        return Ok(Vec::new());
    }
    let mut items = Vec::new();
    for msg in tx.value.msg.iter().filter(|m| m.msg_type == SEND_MSG_TYPE) {
        let send: SendMsg = serde_json::from_value(msg.value.clone())
            .map_err(|e| ChainClientError::decode("send msg", e))?;
        let (Some(sender), Some(receiver)) = (send.inputs.first(), send.outputs.first()) else {
            return Err(ChainClientError::decode("send msg", "no inputs or outputs"));
        };
        let coins: Coins = send
            .outputs
            .iter()
            .flat_map(|o| o.coins.iter())
            .map(|c| Coin::new(Asset::new(Chain::bnb(), &c.denom), c.amount))
            .collect();
        items.push(TxInItem {
            block_height: height,
            tx: hash.to_string(),
            memo: tx.value.memo.clone(),
            sender: Address::new(sender.address.clone()),
            to: Address::new(receiver.address.clone()),
            gas: bnb_gas(coins.len() as u64),
            coins,
            observed_vault_pubkey: PubKey::default(),
        });
    }
    Ok(items)
}

/// Decimal string with up to 8 fractional digits to 1e8 units.
pub fn parse_fixed8(text: &str) -> Result<u64, ChainClientError> {
    let text = text.trim();
    let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|e| ChainClientError::decode("amount", e))?
    };
    let mut frac = frac.chars().take(8).collect::<String>();
    while frac.len() < 8 {
        frac.push('0');
    }
    let frac: u64 = frac
        .parse()
        .map_err(|e| ChainClientError::decode("amount", e))?;
    whole
        .checked_mul(100_000_000)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| ChainClientError::decode("amount", format!("{text} overflows")))
}

fn is_duplicate(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("duplicate") || lower.contains("already exists")
}

/// Account number and sequence cached per vault address.
#[derive(Debug, Clone, Copy, Default)]
struct AccountCache {
    block_height: i64,
    account_number: u64,
    sequence: u64,
}

/// Binance Chain adapter.
pub struct BinanceClient {
    chain: Chain,
    network: ChainNetwork,
    rpc: Arc<BinanceRpc>,
    scanner: BlockScanner<BinanceRpc>,
    bridge: Arc<dyn ThorchainBridge>,
    registry: Arc<dyn PubKeyValidator>,
    signer: VaultSigner,
    accounts: Mutex<HashMap<Address, AccountCache>>,
}

impl BinanceClient {
    /// Adapter for `config`; the scanner store lives in `db`.
    pub fn new(
        config: &ChainConfiguration,
        deps: &ChainClientDeps,
        db: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ChainClientError> {
        config.validate()?;
        let rpc = Arc::new(BinanceRpc::new(config, Arc::clone(&deps.metrics))?);
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
            accounts: Mutex::new(HashMap::new()),
        })
    }

    /// Underlying RPC client.
    pub fn rpc(&self) -> &Arc<BinanceRpc> {
        &self.rpc
    }

    fn check_recipient(&self, to: &Address) -> Result<(), ChainClientError> {
        let (hrp, _) = bech32_decode(to.as_str())
            .map_err(|e| ChainClientError::InvalidInstruction(format!("to address {to}: {e}")))?;
        if hrp != self.network.bnb_prefix() {
            return Err(ChainClientError::InvalidInstruction(format!(
                "to address {to} is not a {} address",
                self.network.bnb_prefix()
            )));
        }
        Ok(())
    }
}

/// Coins of `item` as sorted Binance coins.
fn send_coins(item: &TxOutItem) -> Vec<Value> {
    let mut coins: Vec<(String, u64)> = item
        .coins
        .iter()
        .filter(|c| !c.is_zero())
        .map(|c| (c.asset.symbol.clone(), c.amount))
        .collect();
    coins.sort();
    coins
        .into_iter()
        .map(|(denom, amount)| json!({"denom": denom, "amount": amount}))
        .collect()
}

#[async_trait]
impl ChainClient for BinanceClient {
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
        Ok(pk.get_address(&Chain::bnb(), self.network)?)
    }

    async fn get_account(&self, address: &Address) -> Result<Account, ChainClientError> {
        self.rpc.account(address).await
    }

    fn gas_for(&self, coin_count: u64) -> Gas {
        bnb_gas(coin_count)
    }

    fn matched_address(&self, tx: &TxInItem) -> bool {
        self.registry.matched_address(&self.chain, tx)
    }

    async fn sign(&self, item: &TxOutItem, _height: i64) -> Result<Vec<u8>, ChainClientError> {
        self.check_recipient(&item.to_address)?;
        let coins = send_coins(item);
        if coins.is_empty() {
            return Err(ChainClientError::InvalidInstruction(
                "nothing to send".to_string(),
            ));
        }
        let from = self.get_address(&item.vault_pubkey)?;
        let mut accounts = self.accounts.lock().await;

        let tip = self.rpc.tip().await?;
        let cached = accounts.get(&from).copied().unwrap_or_default();
        let state = if tip > cached.block_height {
            let remote = self.rpc.account(&from).await?;
            AccountCache {
                block_height: tip,
                account_number: remote.account_number,
                sequence: remote.sequence.max(cached.sequence),
            }
        } else {
            cached
        };
        accounts.insert(from.clone(), state);
        debug!(
            vault = %item.vault_pubkey,
            account_number = state.account_number,
            sequence = state.sequence,
            "[bf-05] BNB account state"
        );

        let msg = json!({
            "inputs": [{"address": from.as_str(), "coins": coins}],
            "outputs": [{"address": item.to_address.as_str(), "coins": coins}],
        });
        let sign_doc = json!({
            "account_number": state.account_number.to_string(),
            "chain_id": self.rpc.network_id().await?,
            "data": Value::Null,
            "memo": item.memo,
            "msgs": [msg],
            "sequence": state.sequence.to_string(),
            "source": BROADCAST_SOURCE.to_string(),
        });
        let digest = sha256(canonical_json(&sign_doc).as_bytes());

        let Some(signature) = self.signer.sign_digest(&item.vault_pubkey, &digest).await? else {
            return Ok(Vec::new());
        };
        let pub_key = item.vault_pubkey.secp256k1()?;
        let signed = json!({
            "type": STD_TX_TYPE,
            "value": {
                "msg": [{"type": SEND_MSG_TYPE, "value": msg}],
                "signatures": [{
                    "pub_key": BASE64.encode(pub_key.as_bytes()),
                    "signature": BASE64.encode(signature),
                    "account_number": state.account_number,
                    "sequence": state.sequence,
                }],
                "memo": item.memo,
                "source": BROADCAST_SOURCE,
                "data": Value::Null,
            }
        });
        let raw = serde_json::to_vec(&signed).map_err(|e| ChainClientError::decode("signed tx", e))?;
        Ok(hex::encode(raw).into_bytes())
    }

    async fn broadcast(&self, item: &TxOutItem, payload: &[u8]) -> Result<(), ChainClientError> {
        let from = self.get_address(&item.vault_pubkey)?;
        let mut accounts = self.accounts.lock().await;
        self.rpc.broadcast_hex(payload).await?;
        if let Some(state) = accounts.get_mut(&from) {
            state.sequence += 1;
        }
        Ok(())
    }

    fn on_block_failed(&self, height: i64) {
        self.scanner.mark_failed(height);
    }

    async fn start(&self, out: mpsc::Sender<TxIn>) -> Result<(), ChainClientError> {
        match self.rpc.is_testnet().await {
            Ok(testnet) => info!(chain = %self.chain, testnet, "[bf-05] Connected to BNB node"),
            Err(e) => warn!(chain = %self.chain, error = %e, "[bf-05] Failed to read BNB status"),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{deps, serve};
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use shared_crypto::Secp256k1Signature;
    use shared_storage::InMemoryKVStore;
    use std::sync::atomic::AtomicUsize;

    const RAW_TX: &str = "AQID";

    fn send_view(from: &str, to: &str, memo: &str) -> Value {
        json!({
            "type": "auth/StdTx",
            "value": {
                "msg": [{"type": "cosmos-sdk/Send", "value": {
                    "inputs": [{"address": from, "coins": [{"denom": "BNB", "amount": 100}]}],
                    "outputs": [{"address": to, "coins": [{"denom": "BNB", "amount": 100}]}]
                }}],
                "memo": memo,
                "signatures": []
            }
        })
    }

    fn fake_node(tip: i64, vault_addr: String, broadcasts: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/status",
                get(move || async move {
                    Json(json!({"result": {
                        "node_info": {"network": BNB_TESTNET_NETWORK},
                        "sync_info": {"latest_block_height": tip.to_string()}
                    }}))
                }),
            )
            .route(
                "/block",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let height: i64 = q["height"].parse().unwrap();
                    if height == 2 {
                        return Json(json!({"result": {"block": null}}));
                    }
                    let txs = if height == 1 { json!([RAW_TX]) } else { Value::Null };
                    Json(json!({"result": {"block": {"data": {"txs": txs}}}}))
                }),
            )
            .route(
                "/tx",
                get(move |Query(q): Query<HashMap<String, String>>| {
                    let vault_addr = vault_addr.clone();
                    async move {
                        assert_eq!(q["hash"], format!("0x{}", tx_hash(RAW_TX).unwrap()));
                        Json(json!({"result": {
                            "tx": send_view("tbnb1user", &vault_addr, "SWAP:BNB.RUNE"),
                            "tx_result": {"code": 0}
                        }}))
                    }
                }),
            )
            .route(
                "/api/v1/account/:addr",
                get(|Path(addr): Path<String>| async move {
                    if addr == "tbnb1unknown" {
                        return (StatusCode::NOT_FOUND, Json(json!({"message": "not found"})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "account_number": 7,
                            "address": addr,
                            "sequence": 3,
                            "balances": [
                                {"symbol": "BNB", "free": "1.50000000", "locked": "0", "frozen": "0"},
                                {"symbol": "RUNE-B1A", "free": "0.00000000"}
                            ]
                        })),
                    )
                }),
            )
            .route(
                "/api/v1/broadcast",
                post(move |body: String| {
                    let broadcasts = broadcasts.clone();
                    async move {
                        let n = broadcasts.fetch_add(1, Ordering::SeqCst);
                        assert!(hex::decode(body.trim()).is_ok());
                        if n == 0 {
                            (StatusCode::OK, Json(json!([{"code": 0, "hash": "ABC", "ok": true}])))
                        } else {
                            (
                                StatusCode::BAD_REQUEST,
                                Json(json!({"code": 400, "message": "tx already exists in cache"})),
                            )
                        }
                    }
                }),
            )
    }

    async fn client(tip: i64) -> (BinanceClient, crate::tests_support::Deps, Arc<AtomicUsize>) {
        let d = deps();
        let vault_addr = d
            .node_pubkey()
            .get_address(&Chain::bnb(), ChainNetwork::Testnet)
            .unwrap();
        let broadcasts = Arc::new(AtomicUsize::new(0));
        let base = serve(fake_node(tip, vault_addr.to_string(), broadcasts.clone())).await;
        let config = ChainConfiguration::new(Chain::bnb(), base);
        let client =
            BinanceClient::new(&config, &d.deps, Arc::new(InMemoryKVStore::new())).unwrap();
        (client, d, broadcasts)
    }

    #[tokio::test]
    async fn test_fetch_block_decodes_transfers() {
        let (client, d, _) = client(5).await;
        let block = client.fetch_block(1).await.unwrap();
        assert_eq!(block.tx_array.len(), 1);
        let item = &block.tx_array[0];
        assert_eq!(item.tx, tx_hash(RAW_TX).unwrap());
        assert_eq!(item.sender.as_str(), "tbnb1user");
        assert_eq!(item.memo, "SWAP:BNB.RUNE");
        assert_eq!(item.coins.get(&Asset::new(Chain::bnb(), "BNB")), 100);
        assert_eq!(item.gas, bnb_gas(1));

        d.registry.add_pubkey(d.node_pubkey(), false);
        assert!(client.matched_address(item));
    }

    #[tokio::test]
    async fn test_null_block_and_beyond_tip_are_not_yet_produced() {
        let (client, _, _) = client(5).await;
        assert!(matches!(
            client.fetch_block(2).await,
            Err(ChainClientError::HeightNotYetProduced(2))
        ));
        assert!(matches!(
            client.fetch_block(6).await,
            Err(ChainClientError::HeightNotYetProduced(6))
        ));
        assert!(client.fetch_block(3).await.unwrap().tx_array.is_empty());
        assert!(client.rpc().is_testnet().await.unwrap());
    }

    #[tokio::test]
    async fn test_account_balances() {
        let (client, _, _) = client(5).await;
        let account = client
            .get_account(&Address::new("tbnb1vault"))
            .await
            .unwrap();
        assert_eq!(account.account_number, 7);
        assert_eq!(account.sequence, 3);
        assert_eq!(account.coins.len(), 1);
        assert_eq!(account.coins.get(&Asset::new(Chain::bnb(), "BNB")), 150_000_000);

        let empty = client
            .get_account(&Address::new("tbnb1unknown"))
            .await
            .unwrap();
        assert_eq!(empty, Account::default());
    }

    #[tokio::test]
    async fn test_sign_with_node_key_and_broadcast() {
        let (client, d, broadcasts) = client(5).await;
        let vault = d.node_pubkey();
        let item = TxOutItem {
            chain: Chain::bnb(),
            to_address: vault.get_address(&Chain::bnb(), ChainNetwork::Testnet).unwrap(),
            vault_pubkey: vault.clone(),
            coins: Coins::new(vec![Coin::new(Asset::new(Chain::bnb(), "BNB"), 10)]),
            memo: "OUTBOUND:ABC".to_string(),
            ..Default::default()
        };

        let payload = client.sign(&item, 10).await.unwrap();
        let raw = hex::decode(&payload).unwrap();
        let signed: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(signed["value"]["signatures"][0]["sequence"], 3);
        let sig = BASE64
            .decode(signed["value"]["signatures"][0]["signature"].as_str().unwrap())
            .unwrap();
        assert_eq!(sig.len(), 64);
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&sig);
        assert!(vault
            .secp256k1()
            .unwrap()
            .verify_prehash(
                &sha256(
                    canonical_json(&json!({
                        "account_number": "7",
                        "chain_id": BNB_TESTNET_NETWORK,
                        "data": null,
                        "memo": "OUTBOUND:ABC",
                        "msgs": [signed["value"]["msg"][0]["value"].clone()],
                        "sequence": "3",
                        "source": "0",
                    }))
                    .as_bytes()
                ),
                &Secp256k1Signature::from_bytes(bytes)
            )
            .is_ok());

        client.broadcast(&item, &payload).await.unwrap();
        // second submission is answered "already exists"
        client.broadcast(&item, &payload).await.unwrap();
        assert_eq!(broadcasts.load(Ordering::SeqCst), 2);

        // the tip has not moved, so the local sequence is used
        let payload = client.sign(&item, 10).await.unwrap();
        let signed: Value = serde_json::from_slice(&hex::decode(&payload).unwrap()).unwrap();
        assert_eq!(signed["value"]["signatures"][0]["sequence"], 5);
    }

    #[tokio::test]
    async fn test_rejects_foreign_recipient() {
        let (client, d, _) = client(5).await;
        let item = TxOutItem {
            chain: Chain::bnb(),
            to_address: Address::new("0x0000000000000000000000000000000000000001"),
            vault_pubkey: d.node_pubkey(),
            coins: Coins::new(vec![Coin::new(Asset::new(Chain::bnb(), "BNB"), 10)]),
            ..Default::default()
        };
        assert!(matches!(
            client.sign(&item, 1).await,
            Err(ChainClientError::InvalidInstruction(_))
        ));
    }

    #[test]
    fn test_parse_fixed8() {
        assert_eq!(parse_fixed8("1.5").unwrap(), 150_000_000);
        assert_eq!(parse_fixed8("0.00000001").unwrap(), 1);
        assert_eq!(parse_fixed8("12").unwrap(), 1_200_000_000);
        assert!(parse_fixed8("abc").is_err());
    }

    #[test]
    fn test_non_send_messages_ignored() {
        let view: StdTxView = serde_json::from_value(json!({
            "type": "auth/StdTx",
            "value": {"msg": [{"type": "dex/NewOrder", "value": {}}], "memo": ""}
        }))
        .unwrap();
        assert!(from_std_tx("H", 1, &view).unwrap().is_empty());
    }
}
