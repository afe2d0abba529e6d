//! Bitcoin adapter over bitcoind's JSON-RPC 1.0 interface.
//!
//! Besides scanning, the adapter keeps its own UTXO set per vault in
//! [`BlockMetaStore`]: inbound vault transfers are recorded through
//! `on_observed`, spends and change are applied after a broadcast. Only
//! native segwit (bech32 P2WPKH/P2WSH) recipients are supported.

pub mod block_meta;
pub mod tx;

pub use block_meta::{BlockMeta, BlockMetaStore, UnspentTransactionOutput, BLOCK_CACHE_SIZE};
pub use tx::{
    op_return_script, p2wpkh_script, p2wpkh_script_code, witness_v0_script, SegwitTx, TxInput,
    TxOutput, SIGHASH_ALL,
};

use async_trait::async_trait;
use bf_01_block_scanner::{BlockFetcher, BlockScanner, FetchError, KvScannerStorage};
use bf_02_pubkey_manager::PubKeyValidator;
use bf_03_thorchain_bridge::{BridgeHeightSource, ThorchainBridge};
use bifrost_telemetry::{names, HistogramTimer, Metrics};
use parking_lot::Mutex as SyncMutex;
use serde::Deserialize;
use serde_json::json;
use shared_crypto::{segwit_v0_decode, sha256, Secp256k1Signature};
use shared_storage::KeyValueStore;
use shared_types::gas::{btc_gas, BTC_SATS_PER_VBYTE};
use shared_types::{
    Address, Chain, ChainNetwork, Coin, Coins, Gas, PubKey, TxIn, TxInItem, TxOutItem,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::adapters::{JsonRpcClient, VaultSigner};
use crate::{Account, ChainClient, ChainClientDeps, ChainClientError, ChainConfiguration};

/// Confirmations an output needs before a shared vault spends it.
pub const MIN_UTXO_CONFIRMATION: i64 = 10;

/// Virtual size assumed by `gas_for`: one input, recipient, memo, change.
pub const TYPICAL_TX_VSIZE: u64 = 250;

const RPC_INVALID_PARAMETER: i64 = -8;
const RPC_VERIFY_ALREADY_IN_CHAIN: i64 = -27;

const SATS_PER_BTC: f64 = 100_000_000.0;

fn to_sats(btc: f64) -> u64 {
    (btc * SATS_PER_BTC).round().max(0.0) as u64
}

#[derive(Debug, Deserialize)]
struct BtcBlock {
    hash: String,
    #[serde(default)]
    previousblockhash: String,
    #[serde(default)]
    tx: Vec<BtcTx>,
}

#[derive(Debug, Clone, Deserialize)]
struct BtcTx {
    txid: String,
    #[serde(default)]
    vin: Vec<Vin>,
    #[serde(default)]
    vout: Vec<Vout>,
}

#[derive(Debug, Clone, Deserialize)]
struct Vin {
    #[serde(default)]
    txid: Option<String>,
    #[serde(default)]
    vout: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct Vout {
    value: f64,
    n: u32,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScriptPubKey {
    #[serde(default)]
    asm: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    addresses: Vec<String>,
}

impl ScriptPubKey {
    /// The single address paid, across bitcoind versions.
    fn address(&self) -> Option<&str> {
        match (&self.address, self.addresses.as_slice()) {
            (Some(address), _) => Some(address),
            (None, [single]) => Some(single),
            _ => None,
        }
    }
}

impl BtcTx {
    fn is_ignored(&self) -> bool {
        if self.vin.is_empty() || self.vout.is_empty() || self.vout.len() > 4 {
            return true;
        }
        let first = &self.vout[0];
        if first.value == 0.0 || first.script_pub_key.address().is_none() {
            return true;
        }
        // coinbase inputs carry no txid
        if self.vin[0].txid.is_none() {
            return true;
        }
        self.vout.iter().filter(|v| v.value > 0.0).count() > 2
    }

    fn memo(&self) -> String {
        let data: String = self
            .vout
            .iter()
            .filter_map(|v| v.script_pub_key.asm.strip_prefix("OP_RETURN "))
            .collect();
        hex::decode(data)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_default()
    }

    fn output_to_other(&self, sender: &str) -> Option<&Vout> {
        self.vout.iter().find(|v| {
            v.value > 0.0
                && v.script_pub_key
                    .address()
                    .is_some_and(|a| !a.eq_ignore_ascii_case(sender))
        })
    }
}

/// Block source over bitcoind. Records block hashes for reorg detection
/// while scanning.
pub struct BitcoinRpc {
    chain: Chain,
    rpc: JsonRpcClient,
    tip: AtomicI64,
    metas: BlockMetaStore,
    // txid -> (output index, height) of transfers awaiting on_observed
    pending_outputs: SyncMutex<HashMap<String, (u32, i64)>>,
    metrics: Arc<Metrics>,
}

impl BitcoinRpc {
    /// RPC client for `config` keeping bookkeeping in `db`.
    pub fn new(
        config: &ChainConfiguration,
        db: Arc<dyn KeyValueStore>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ChainClientError> {
        Ok(Self {
            chain: config.chain_id.clone(),
            rpc: JsonRpcClient::new(config.http_client()?, "1.0"),
            tip: AtomicI64::new(0),
            metas: BlockMetaStore::new(db),
            pending_outputs: SyncMutex::new(HashMap::new()),
            metrics,
        })
    }

    /// Block bookkeeping.
    pub fn metas(&self) -> &BlockMetaStore {
        &self.metas
    }

    async fn tip(&self) -> Result<i64, ChainClientError> {
        let tip: i64 = self.rpc.call("getblockcount", json!([])).await?;
        self.tip.store(tip, Ordering::SeqCst);
        Ok(tip)
    }

    async fn raw_tx(&self, txid: &str) -> Result<BtcTx, ChainClientError> {
        self.rpc.call("getrawtransaction", json!([txid, true])).await
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
        let hash: String = match self.rpc.call("getblockhash", json!([height])).await {
            Ok(hash) => hash,
            Err(ChainClientError::Rpc { code, .. }) if code == RPC_INVALID_PARAMETER => {
                return Err(ChainClientError::HeightNotYetProduced(height))
            }
            Err(e) => return Err(e),
        };
        let block: BtcBlock = self.rpc.call("getblock", json!([hash, 2])).await?;
        self.record_block(height, &block)?;

        let mut tx_in = TxIn::empty(self.chain.clone(), height);
        let mut prevouts: HashMap<String, BtcTx> = HashMap::new();
        for tx in block.tx.iter().filter(|tx| !tx.is_ignored()) {
            if let Some(item) = self.to_tx_in_item(height, tx, &mut prevouts).await? {
                tx_in.tx_array.push(item);
            }
        }

        let suffix = if block.tx.is_empty() {
            names::BLOCK_WITHOUT_TX
        } else if tx_in.tx_array.is_empty() {
            names::BLOCK_NO_TX_IN
        } else {
            names::BLOCK_WITH_TX_IN
        };
        self.metrics.chain_counter(self.chain.as_str(), suffix).inc();
        Ok(tx_in)
    }

    /// Save the block's hashes, dropping bookkeeping a reorg invalidated.
    fn record_block(&self, height: i64, block: &BtcBlock) -> Result<(), ChainClientError> {
        if let Some(mut previous) = self.metas.get(height - 1)? {
            if !previous.block_hash.is_empty()
                && !previous.block_hash.eq_ignore_ascii_case(&block.previousblockhash)
            {
                warn!(
                    height,
                    recorded = %previous.block_hash,
                    parent = %block.previousblockhash,
                    dropped = previous.utxos.len(),
                    "[bf-05] Reorg detected, dropping UTXOs of the replaced block"
                );
                previous.utxos.clear();
                previous.block_hash = block.previousblockhash.clone();
                self.metas.save(&previous)?;
            }
        }

        let mut meta = self
            .metas
            .get(height)?
            .unwrap_or_else(|| BlockMeta::new(height, "", ""));
        if !meta.block_hash.is_empty() && !meta.block_hash.eq_ignore_ascii_case(&block.hash) {
            warn!(height, "[bf-05] Block replaced at height, dropping its UTXOs");
            meta.utxos.clear();
        }
        meta.block_hash = block.hash.clone();
        meta.previous_hash = block.previousblockhash.clone();
        self.metas.save(&meta)?;

        let keep_from = height - BLOCK_CACHE_SIZE;
        let pruned = self.metas.prune_below(keep_from)?;
        if pruned > 0 {
            debug!(pruned, "[bf-05] Pruned block metas");
        }
        self.pending_outputs
            .lock()
            .retain(|_, (_, seen)| *seen >= keep_from);
        Ok(())
    }

    async fn prevout(
        &self,
        vin: &Vin,
        cache: &mut HashMap<String, BtcTx>,
    ) -> Result<Option<Vout>, ChainClientError> {
        let (Some(txid), Some(n)) = (&vin.txid, vin.vout) else {
            return Ok(None);
        };
        if !cache.contains_key(txid) {
            let tx = self.raw_tx(txid).await?;
            cache.insert(txid.clone(), tx);
        }
        Ok(cache
            .get(txid)
            .and_then(|tx| tx.vout.iter().find(|v| v.n == n))
            .cloned())
    }

    async fn to_tx_in_item(
        &self,
        height: i64,
        tx: &BtcTx,
        cache: &mut HashMap<String, BtcTx>,
    ) -> Result<Option<TxInItem>, ChainClientError> {
        let Some(sender) = self
            .prevout(&tx.vin[0], cache)
            .await?
            .and_then(|v| v.script_pub_key.address().map(str::to_string))
        else {
            debug!(txid = %tx.txid, "[bf-05] No sender address, skipping");
            return Ok(None);
        };
        let Some(output) = tx.output_to_other(&sender) else {
            return Ok(None);
        };
        let Some(to) = output.script_pub_key.address() else {
            return Ok(None);
        };

        let mut sum_in = 0u64;
        for vin in &tx.vin {
            if let Some(prev) = self.prevout(vin, cache).await? {
                sum_in = sum_in.saturating_add(to_sats(prev.value));
            }
        }
        let sum_out: u64 = tx.vout.iter().map(|v| to_sats(v.value)).sum();
        let btc = Chain::btc().gas_asset();

        self.pending_outputs
            .lock()
            .insert(tx.txid.clone(), (output.n, height));
        Ok(Some(TxInItem {
            block_height: height,
            tx: tx.txid.clone(),
            memo: tx.memo(),
            sender: Address::new(sender),
            to: Address::new(to),
            coins: Coins::new(vec![Coin::new(btc.clone(), to_sats(output.value))]),
            gas: Coins::new(vec![Coin::new(btc, sum_in.saturating_sub(sum_out))]),
            observed_vault_pubkey: PubKey::default(),
        }))
    }

    /// Index of the vault output of `txid`, as seen while scanning.
    fn take_pending_output(&self, txid: &str) -> Option<u32> {
        self.pending_outputs.lock().remove(txid).map(|(n, _)| n)
    }

    /// `sendrawtransaction`; a transaction already in the chain is success.
    pub async fn send_raw(&self, payload: &[u8]) -> Result<Option<String>, ChainClientError> {
        match self
            .rpc
            .call::<String>("sendrawtransaction", json!([hex::encode(payload)]))
            .await
        {
            Ok(txid) => Ok(Some(txid)),
            Err(ChainClientError::Rpc { code, message })
                if code == RPC_VERIFY_ALREADY_IN_CHAIN || message.contains("already in") =>
            {
                info!(chain = %self.chain, reason = %message, "[bf-05] Tx already broadcast");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BlockFetcher for BitcoinRpc {
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

/// Bookkeeping to apply once a signed payload is accepted.
#[derive(Debug, Clone)]
struct PendingSpend {
    txid: String,
    spent: Vec<String>,
    change: Option<UnspentTransactionOutput>,
    height: i64,
}

/// Bitcoin adapter.
pub struct BitcoinClient {
    chain: Chain,
    network: ChainNetwork,
    rpc: Arc<BitcoinRpc>,
    scanner: BlockScanner<BitcoinRpc>,
    bridge: Arc<dyn ThorchainBridge>,
    registry: Arc<dyn PubKeyValidator>,
    signer: VaultSigner,
    pending: Mutex<HashMap<[u8; 32], PendingSpend>>,
}

impl BitcoinClient {
    /// Adapter for `config`; scanner state and block metas live in `db`.
    pub fn new(
        config: &ChainConfiguration,
        deps: &ChainClientDeps,
        db: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ChainClientError> {
        config.validate()?;
        let rpc = Arc::new(BitcoinRpc::new(
            config,
            Arc::clone(&db),
            Arc::clone(&deps.metrics),
        )?);
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
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Underlying RPC client.
    pub fn rpc(&self) -> &Arc<BitcoinRpc> {
        &self.rpc
    }

    fn recipient_script(&self, to: &Address) -> Result<Vec<u8>, ChainClientError> {
        let program = segwit_v0_decode(self.network.btc_hrp(), to.as_str()).map_err(|e| {
            ChainClientError::InvalidInstruction(format!("to address {to}: {e}"))
        })?;
        Ok(witness_v0_script(&program))
    }

    /// Outputs of `vault` to fund `target` satoshis, oldest first.
    ///
    /// Shared vaults only spend outputs with `MIN_UTXO_CONFIRMATION`
    /// confirmations. Outputs about to leave the bookkeeping window are
    /// always consumed.
    fn select_utxos(
        &self,
        tip: i64,
        vault: &PubKey,
        target: u64,
        node_key: bool,
    ) -> Result<Vec<UnspentTransactionOutput>, ChainClientError> {
        let stop_height = if node_key {
            tip
        } else {
            tip - MIN_UTXO_CONFIRMATION
        };
        let consume_all_height = tip - BLOCK_CACHE_SIZE + 1;
        let mut selected = Vec::new();
        let mut total = 0u64;
        for meta in self.rpc.metas.all()? {
            if meta.height > stop_height {
                continue;
            }
            if meta.height <= consume_all_height || total < target {
                for utxo in meta.utxos_of(vault) {
                    total = total.saturating_add(utxo.value);
                    selected.push(utxo.clone());
                }
            }
        }
        Ok(selected)
    }
}

#[async_trait]
impl ChainClient for BitcoinClient {
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
        Ok(pk.get_address(&Chain::btc(), self.network)?)
    }

    async fn get_account(&self, address: &Address) -> Result<Account, ChainClientError> {
        let Some(vault) = self.registry.is_valid_vault_address(address, &self.chain) else {
            return Ok(Account::default());
        };
        let balance = self.rpc.metas.balance(&vault)?;
        Ok(Account::with_coins(
            Coins::new(vec![Coin::new(Chain::btc().gas_asset(), balance)]).non_zero(),
        ))
    }

    fn gas_for(&self, _coin_count: u64) -> Gas {
        btc_gas(TYPICAL_TX_VSIZE, BTC_SATS_PER_VBYTE)
    }

    fn matched_address(&self, tx: &TxInItem) -> bool {
        self.registry.matched_address(&self.chain, tx)
    }

    async fn sign(&self, item: &TxOutItem, _height: i64) -> Result<Vec<u8>, ChainClientError> {
        let btc = Chain::btc().gas_asset();
        let amount = item.coins.get(&btc);
        if amount == 0 {
            return Err(ChainClientError::InvalidInstruction(
                "nothing to send".to_string(),
            ));
        }
        let recipient = self.recipient_script(&item.to_address)?;
        let vault_key = item.vault_pubkey.secp256k1()?;
        let source_script = p2wpkh_script(vault_key.as_bytes());
        let max_gas = item.max_gas.get(&btc);

        let mut pending = self.pending.lock().await;
        let tip = self.rpc.tip().await?;
        let node_key = self.signer.is_node_key(&item.vault_pubkey)?;
        let fee_hint = if max_gas > 0 {
            max_gas
        } else {
            TYPICAL_TX_VSIZE * BTC_SATS_PER_VBYTE
        };
        let utxos = self.select_utxos(tip, &item.vault_pubkey, amount + fee_hint, node_key)?;
        let total: u64 = utxos.iter().map(|u| u.value).sum();

        let mut tx = SegwitTx::default();
        for utxo in &utxos {
            tx.inputs.push(TxInput::from_txid(&utxo.txid, utxo.n, utxo.value)?);
        }
        tx.outputs.push(TxOutput {
            value: amount,
            script_pubkey: recipient,
        });
        if !item.memo.is_empty() {
            tx.outputs.push(TxOutput {
                value: 0,
                script_pubkey: op_return_script(item.memo.as_bytes())?,
            });
        }
        let change_output = TxOutput {
            value: 0,
            script_pubkey: source_script.clone(),
        };
        let fee = if max_gas > 0 {
            max_gas
        } else {
            let mut sized = tx.clone();
            sized.outputs.push(change_output.clone());
            sized.estimated_vsize() * BTC_SATS_PER_VBYTE
        };
        let need = amount.saturating_add(fee);
        if utxos.is_empty() || total < need {
            return Err(ChainClientError::InsufficientFunds { need, have: total });
        }
        let change = total - need;
        if change > 0 {
            tx.outputs.push(TxOutput {
                value: change,
                ..change_output
            });
        }

        // BIP-69 ordering
        tx.inputs.sort_by(|a, b| {
            let mut ra = a.prev_hash;
            let mut rb = b.prev_hash;
            ra.reverse();
            rb.reverse();
            ra.cmp(&rb).then(a.prev_index.cmp(&b.prev_index))
        });
        tx.outputs.sort_by(|a, b| {
            a.value
                .cmp(&b.value)
                .then_with(|| a.script_pubkey.cmp(&b.script_pubkey))
        });

        let script_code = p2wpkh_script_code(vault_key.as_bytes());
        let mut witnesses = Vec::with_capacity(tx.inputs.len());
        for index in 0..tx.inputs.len() {
            let digest = tx.sighash(index, &script_code, SIGHASH_ALL);
            let Some(signature) = self.signer.sign_digest(&item.vault_pubkey, &digest).await?
            else {
                return Ok(Vec::new());
            };
            let mut der = Secp256k1Signature::from_bytes(signature).to_der()?;
            der.push(SIGHASH_ALL as u8);
            witnesses.push(vec![der, vault_key.as_bytes().to_vec()]);
        }
        tx.witnesses = witnesses;

        let txid = tx.txid();
        let change = tx
            .outputs
            .iter()
            .position(|o| change > 0 && o.script_pubkey == source_script && o.value == change)
            .map(|n| UnspentTransactionOutput {
                txid: txid.clone(),
                n: n as u32,
                value: change,
                block_height: tip,
                vault_pubkey: item.vault_pubkey.clone(),
            });
        let payload = tx.serialize();
        info!(
            txid = %txid,
            inputs = tx.inputs.len(),
            fee,
            "[bf-05] Signed BTC tx"
        );
        pending.insert(
            sha256(&payload),
            PendingSpend {
                txid,
                spent: utxos.iter().map(UnspentTransactionOutput::key).collect(),
                change,
                height: tip,
            },
        );
        Ok(payload)
    }

    async fn broadcast(&self, _item: &TxOutItem, payload: &[u8]) -> Result<(), ChainClientError> {
        let mut pending = self.pending.lock().await;
        let txid = self.rpc.send_raw(payload).await?;
        if let Some(txid) = &txid {
            info!(chain = %self.chain, txid = %txid, "[bf-05] Broadcast to BTC");
        }
        let Some(spend) = pending.remove(&sha256(payload)) else {
            return Ok(());
        };
        self.rpc.metas.spend(&spend.spent)?;
        let mut meta = self
            .rpc
            .metas
            .get(spend.height)?
            .unwrap_or_else(|| BlockMeta::new(spend.height, "", ""));
        if let Some(change) = spend.change {
            meta.add_utxo(change);
        }
        meta.add_self_transaction(spend.txid);
        self.rpc.metas.save(&meta)?;
        Ok(())
    }

    async fn on_observed(&self, tx: &TxInItem) {
        let Some(vault) = self.registry.is_valid_vault_address(&tx.to, &self.chain) else {
            return;
        };
        let n = self.rpc.take_pending_output(&tx.tx).unwrap_or(0);
        let mut meta = match self.rpc.metas.get(tx.block_height) {
            Ok(Some(meta)) => meta,
            Ok(None) => {
                error!(height = tx.block_height, txid = %tx.tx, "[bf-05] No block meta for observed tx");
                return;
            }
            Err(e) => {
                error!(height = tx.block_height, error = %e, "[bf-05] Failed to read block meta");
                return;
            }
        };
        meta.add_utxo(UnspentTransactionOutput {
            txid: tx.tx.clone(),
            n,
            value: tx.coins.get(&Chain::btc().gas_asset()),
            block_height: tx.block_height,
            vault_pubkey: vault,
        });
        if let Err(e) = self.rpc.metas.save(&meta) {
            error!(height = tx.block_height, error = %e, "[bf-05] Failed to save block meta");
        }
    }

    fn on_block_failed(&self, height: i64) {
        self.scanner.mark_failed(height);
    }

    async fn start(&self, out: mpsc::Sender<TxIn>) -> Result<(), ChainClientError> {
        match self.rpc.tip().await {
            Ok(tip) => info!(chain = %self.chain, tip, "[bf-05] Connected to bitcoind"),
            Err(e) => warn!(chain = %self.chain, error = %e, "[bf-05] Failed to read block count"),
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
    use crate::tests_support::{deps, serve, Deps};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use shared_crypto::{segwit_v0_encode, Secp256k1KeyPair};
    use shared_storage::InMemoryKVStore;
    use std::sync::atomic::AtomicUsize;

    const TIP: i64 = 10;
    const SENDER: &str = "tb1qsender";

    fn rpc_ok(id: &Value, result: Value) -> (StatusCode, Json<Value>) {
        (
            StatusCode::OK,
            Json(json!({"result": result, "error": null, "id": id})),
        )
    }

    fn rpc_err(id: &Value, code: i64, message: &str) -> (StatusCode, Json<Value>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"result": null, "error": {"code": code, "message": message}, "id": id})),
        )
    }

    fn block_at(height: i64, vault: &str) -> Value {
        let memo = hex::encode("SWAP:BNB.BNB");
        json!({
            "hash": format!("h{height}"),
            "previousblockhash": format!("h{}", height - 1),
            "height": height,
            "tx": [
                {"txid": "c0", "vin": [{"coinbase": "03ab"}],
                 "vout": [{"value": 6.25, "n": 0, "scriptPubKey": {"asm": "", "address": "tb1qminer"}}]},
                {"txid": "aa".repeat(32), "vin": [{"txid": "p1", "vout": 0}],
                 "vout": [
                    {"value": 0.5, "n": 0, "scriptPubKey": {"asm": "0 abcd", "address": vault}},
                    {"value": 0.0, "n": 1, "scriptPubKey": {"asm": format!("OP_RETURN {memo}")}},
                    {"value": 0.2, "n": 2, "scriptPubKey": {"asm": "0 ef01", "addresses": [SENDER]}}
                 ]}
            ]
        })
    }

    fn fake_bitcoind(vault: String, sends: Arc<AtomicUsize>) -> Router {
        Router::new().route(
            "/",
            post(move |Json(req): Json<Value>| {
                let vault = vault.clone();
                let sends = sends.clone();
                async move {
                    let id = req["id"].clone();
                    let params = &req["params"];
                    match req["method"].as_str().unwrap_or_default() {
                        "getblockcount" => rpc_ok(&id, json!(TIP)),
                        "getblockhash" => match params[0].as_i64() {
                            Some(7) => rpc_err(&id, -8, "Block height out of range"),
                            Some(h) => rpc_ok(&id, json!(format!("h{h}"))),
                            None => rpc_err(&id, -1, "bad params"),
                        },
                        "getblock" => {
                            let hash = params[0].as_str().unwrap_or_default();
                            let height: i64 = hash.trim_start_matches('h').parse().unwrap_or(0);
                            rpc_ok(&id, block_at(height, &vault))
                        }
                        "getrawtransaction" => rpc_ok(
                            &id,
                            json!({"txid": "p1", "vin": [], "vout": [
                                {"value": 0.7001, "n": 0, "scriptPubKey": {"asm": "", "address": SENDER}}
                            ]}),
                        ),
                        "sendrawtransaction" => {
                            if sends.fetch_add(1, Ordering::SeqCst) == 0 {
                                rpc_ok(&id, json!("bb".repeat(32)))
                            } else {
                                rpc_err(&id, -27, "Transaction already in block chain")
                            }
                        }
                        _ => rpc_err(&id, -32601, "Method not found"),
                    }
                }
            }),
        )
    }

    async fn client() -> (BitcoinClient, Deps, Arc<AtomicUsize>) {
        let d = deps();
        d.registry.add_node_pubkey(d.node_pubkey());
        let vault_addr = d
            .node_pubkey()
            .get_address(&Chain::btc(), ChainNetwork::Testnet)
            .unwrap();
        let sends = Arc::new(AtomicUsize::new(0));
        let base = serve(fake_bitcoind(vault_addr.to_string(), sends.clone())).await;
        let config = ChainConfiguration::new(Chain::btc(), base);
        let client =
            BitcoinClient::new(&config, &d.deps, Arc::new(InMemoryKVStore::new())).unwrap();
        (client, d, sends)
    }

    fn recipient() -> Address {
        let other = Secp256k1KeyPair::generate();
        let program = shared_crypto::hash160(other.public_key().as_bytes());
        Address::new(segwit_v0_encode("tb", &program).unwrap())
    }

    #[tokio::test]
    async fn test_fetch_block_extracts_transfer() {
        let (client, _d, _) = client().await;
        let block = client.fetch_block(TIP).await.unwrap();
        assert_eq!(block.tx_array.len(), 1);
        let item = &block.tx_array[0];
        let btc = Chain::btc().gas_asset();
        assert_eq!(item.sender.as_str(), SENDER);
        assert_eq!(item.memo, "SWAP:BNB.BNB");
        assert_eq!(item.coins.get(&btc), 50_000_000);
        assert_eq!(item.gas.get(&btc), 10_000);
        assert!(client.matched_address(item));

        let meta = client.rpc().metas().get(TIP).unwrap().unwrap();
        assert_eq!(meta.block_hash, "h10");
        assert_eq!(meta.previous_hash, "h9");
    }

    #[tokio::test]
    async fn test_heights_not_yet_produced() {
        let (client, _, _) = client().await;
        assert!(matches!(
            client.fetch_block(7).await,
            Err(ChainClientError::HeightNotYetProduced(7))
        ));
        assert!(matches!(
            client.fetch_block(TIP + 1).await,
            Err(ChainClientError::HeightNotYetProduced(11))
        ));
    }

    #[tokio::test]
    async fn test_sign_spends_observed_utxo() {
        let (client, d, sends) = client().await;
        let vault = d.node_pubkey();
        let vault_addr = client.get_address(&vault).unwrap();
        let block = client.fetch_block(TIP).await.unwrap();
        client.on_observed(&block.tx_array[0]).await;
        let btc = Chain::btc().gas_asset();
        let account = client.get_account(&vault_addr).await.unwrap();
        assert_eq!(account.coins.get(&btc), 50_000_000);

        let item = TxOutItem {
            chain: Chain::btc(),
            to_address: recipient(),
            vault_pubkey: vault.clone(),
            coins: Coins::new(vec![Coin::new(btc.clone(), 10_000_000)]),
            memo: "OUTBOUND:AA".to_string(),
            ..Default::default()
        };
        let payload = client.sign(&item, 1).await.unwrap();
        assert_eq!(&payload[..6], &[0x01, 0x00, 0x00, 0x00, 0x00, 0x01]);

        client.broadcast(&item, &payload).await.unwrap();
        let account = client.get_account(&vault_addr).await.unwrap();
        let change = account.coins.get(&btc);
        assert!(change > 39_000_000 && change < 40_000_000);
        let meta = client.rpc().metas().get(TIP).unwrap().unwrap();
        assert_eq!(meta.self_transactions.len(), 1);
        assert!(meta.utxos.iter().all(|u| u.txid != "aa".repeat(32)));

        // already in chain
        client.broadcast(&item, &payload).await.unwrap();
        assert_eq!(sends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_insufficient_funds_and_bad_recipient() {
        let (client, d, _) = client().await;
        let btc = Chain::btc().gas_asset();
        let mut item = TxOutItem {
            chain: Chain::btc(),
            to_address: recipient(),
            vault_pubkey: d.node_pubkey(),
            coins: Coins::new(vec![Coin::new(btc, 10_000_000)]),
            ..Default::default()
        };
        assert!(matches!(
            client.sign(&item, 1).await,
            Err(ChainClientError::InsufficientFunds { have: 0, .. })
        ));

        item.to_address = Address::new("mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn");
        assert!(matches!(
            client.sign(&item, 1).await,
            Err(ChainClientError::InvalidInstruction(_))
        ));
    }

    #[tokio::test]
    async fn test_reorg_drops_replaced_utxos() {
        let (client, d, _) = client().await;
        let mut stale = BlockMeta::new(TIP - 1, "orphan", "h8");
        stale.add_utxo(UnspentTransactionOutput {
            txid: "dd".repeat(32),
            n: 0,
            value: 1_000,
            block_height: TIP - 1,
            vault_pubkey: d.node_pubkey(),
        });
        client.rpc().metas().save(&stale).unwrap();

        client.fetch_block(TIP).await.unwrap();
        let replaced = client.rpc().metas().get(TIP - 1).unwrap().unwrap();
        assert!(replaced.utxos.is_empty());
        assert_eq!(replaced.block_hash, "h9");
    }

    #[tokio::test]
    async fn test_utxo_selection_respects_confirmations() {
        let meta_at = |height: i64, vault: &PubKey| {
            let mut meta = BlockMeta::new(height, format!("h{height}"), "");
            meta.add_utxo(UnspentTransactionOutput {
                txid: format!("{height:064x}"),
                n: 0,
                value: 100,
                block_height: height,
                vault_pubkey: vault.clone(),
            });
            meta
        };
        let (client, _, _) = client().await;
        let vault = PubKey::new_unchecked("tthorpub1shared");
        for height in [1, 95, 100, 105] {
            client.rpc().metas().save(&meta_at(height, &vault)).unwrap();
        }
        // tip 105: height 105 lacks confirmations, heights <= 6 must go
        let shared = client.select_utxos(105, &vault, 150, false).unwrap();
        let heights: Vec<i64> = shared.iter().map(|u| u.block_height).collect();
        assert_eq!(heights, vec![1, 95]);

        let own = client.select_utxos(105, &vault, 1_000, true).unwrap();
        assert_eq!(own.len(), 4);
    }
}
