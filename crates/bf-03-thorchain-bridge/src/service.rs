//! # Thorchain Bridge Client
//!
//! REST client of the local consensus node. Queries go through
//! [`RetryingHttpClient`]; broadcasts are serialised by one async mutex
//! that owns the node's `(account_number, sequence)`.

use async_trait::async_trait;
use bf_02_pubkey_manager::VaultPubKeys;
use bifrost_telemetry::{names, Metrics};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{Address, Chain, ChainNetwork, KeygenBlock, PubKey, PubKeys};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::responses::{AccountResp, KeygenResp, VaultPubKeysResp};
use crate::{
    AccountInfo, BridgeError, BroadcastResult, ChainsTxOut, Keys, NodeAccount, QueryResHeights,
    RetryingHttpClient, StdSignDoc, StdSignature, StdTx, ThorchainBridge, ThorchainConfig,
};

/// Polls made by `wait_to_catch_up` before giving up.
const CATCH_UP_ATTEMPTS: u32 = 60;

/// Broadcast body for `/txs`.
#[derive(Serialize)]
struct BroadcastReq<'a> {
    tx: &'a StdTx,
    mode: &'static str,
}

/// Account position guarded by the broadcast lock.
#[derive(Debug, Default)]
struct AccountState {
    account_number: u64,
    sequence: u64,
    /// Consensus tip at the last account read; 0 forces a fresh read.
    block_height: i64,
}

/// REST implementation of [`ThorchainBridge`].
pub struct ThorchainBridgeClient {
    config: ThorchainConfig,
    http: RetryingHttpClient,
    keys: Keys,
    address: Address,
    metrics: Arc<Metrics>,
    account: Mutex<AccountState>,
    catch_up_interval: Duration,
}

impl ThorchainBridgeClient {
    /// Client for `config.chain_host` signing with `keys`.
    pub fn new(
        config: ThorchainConfig,
        keys: Keys,
        metrics: Arc<Metrics>,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let base_url = if config.chain_host.contains("://") {
            config.chain_host.clone()
        } else {
            format!("http://{}", config.chain_host)
        };
        let http = RetryingHttpClient::new(
            base_url,
            config.http_request_timeout,
            config.back_off.clone(),
            config.max_http_request_retry,
        )?;
        let address = keys.address()?;
        info!(address = %address, host = %config.chain_host, "[bf-03] Thorchain bridge created");
        Ok(Self {
            config,
            http,
            keys,
            address,
            metrics,
            account: Mutex::new(AccountState::default()),
            catch_up_interval: Duration::from_secs(1),
        })
    }

    /// Delay between catch-up polls.
    pub fn with_catch_up_interval(mut self, interval: Duration) -> Self {
        self.catch_up_interval = interval;
        self
    }

    /// The node key.
    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// Account number and sequence as reported by consensus.
    pub async fn get_account(&self) -> Result<AccountInfo, BridgeError> {
        let resp: AccountResp = self
            .get_json("account", &format!("/auth/accounts/{}", self.address))
            .await?;
        Ok(resp.result.value)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        what: &'static str,
        path: &str,
    ) -> Result<T, BridgeError> {
        let body = self.http.get(path).await.map_err(|e| {
            self.metrics
                .inc_error(names::THORCHAIN_BRIDGE_ERROR, "fail_get_from_thorchain", path);
            BridgeError::from(e)
        })?;
        serde_json::from_str(&body).map_err(|e| {
            self.metrics
                .inc_error(names::THORCHAIN_BRIDGE_ERROR, "fail_unmarshal", what);
            BridgeError::decode(what, e)
        })
    }

    async fn last_block(&self, chain: &Chain) -> Result<QueryResHeights, BridgeError> {
        let heights: Vec<QueryResHeights> = self
            .get_json("last block", &format!("/thorchain/lastblock/{chain}"))
            .await?;
        heights
            .into_iter()
            .find(|h| &h.chain == chain)
            .ok_or_else(|| BridgeError::decode("last block", format!("no entry for {chain}")))
    }

    fn sign_std_tx(&self, tx: &StdTx, state: &AccountState) -> Result<StdTx, BridgeError> {
        let _timer = self.metrics.start_timer(names::SIGN_TO_THORCHAIN_DURATION);
        let doc = StdSignDoc::new(
            &self.config.chain_id,
            state.account_number,
            state.sequence,
            tx,
        );
        let signature = self.keys.sign(&doc.sign_bytes()?).map_err(|e| {
            self.metrics
                .inc_error(names::THORCHAIN_BRIDGE_ERROR, "fail_sign", "");
            e
        })?;
        let mut signed = tx.clone();
        signed.signatures = vec![StdSignature::new(&self.keys.public_key(), &signature)];
        self.metrics.counter(names::TX_TO_THORCHAIN_SIGNED).inc();
        Ok(signed)
    }

    async fn refresh_account(&self, state: &mut AccountState) -> Result<(), BridgeError> {
        let height = self.get_block_height().await?;
        if height <= state.block_height {
            return Ok(());
        }
        let info = self.get_account().await?;
        state.account_number = info.account_number;
        state.sequence = info.sequence.max(state.sequence);
        state.block_height = height;
        debug!(
            account_number = state.account_number,
            sequence = state.sequence,
            height,
            "[bf-03] Refreshed account"
        );
        Ok(())
    }
}

#[async_trait]
impl ThorchainBridge for ThorchainBridgeClient {
    fn signer_address(&self) -> Address {
        self.address.clone()
    }

    fn network(&self) -> ChainNetwork {
        self.keys.network()
    }

    async fn wait_to_catch_up(&self) -> Result<(), BridgeError> {
        for attempt in 1..=CATCH_UP_ATTEMPTS {
            match self.get_block_height().await {
                Ok(height) if height > 0 => return Ok(()),
                Ok(_) => debug!(attempt, "[bf-03] Consensus height not known yet"),
                Err(e) => warn!(attempt, error = %e, "[bf-03] Failed to get consensus height"),
            }
            tokio::time::sleep(self.catch_up_interval).await;
        }
        Err(BridgeError::decode(
            "last block",
            "consensus node did not report a height",
        ))
    }

    async fn get_block_height(&self) -> Result<i64, BridgeError> {
        let heights: Vec<QueryResHeights> =
            self.get_json("last block", "/thorchain/lastblock").await?;
        Ok(heights.first().map(|h| h.statechain).unwrap_or(0))
    }

    async fn get_last_observed_in_height(&self, chain: &Chain) -> Result<i64, BridgeError> {
        Ok(self.last_block(chain).await?.lastobservedin)
    }

    async fn get_last_signed_out_height(&self, chain: &Chain) -> Result<i64, BridgeError> {
        Ok(self.last_block(chain).await?.lastsignedout)
    }

    async fn get_node_account(&self, address: &Address) -> Result<NodeAccount, BridgeError> {
        self.get_json("node account", &format!("/thorchain/nodeaccount/{address}"))
            .await
    }

    async fn get_pubkeys(&self) -> Result<VaultPubKeys, BridgeError> {
        let resp: VaultPubKeysResp = self
            .get_json("vault pubkeys", "/thorchain/vaults/pubkeys")
            .await?;
        Ok(VaultPubKeys {
            asgard: resp.asgard,
            yggdrasil: resp.yggdrasil,
        })
    }

    async fn get_keysign_party(&self, vault: &PubKey) -> Result<PubKeys, BridgeError> {
        self.get_json("keysign party", &format!("/thorchain/vaults/{vault}/signers"))
            .await
    }

    async fn get_keysign(&self, height: i64, pk: &PubKey) -> Result<ChainsTxOut, BridgeError> {
        self.get_json("keysign", &format!("/thorchain/keysign/{height}/{pk}"))
            .await
    }

    async fn get_keygen_block(
        &self,
        height: i64,
        pk: &PubKey,
    ) -> Result<KeygenBlock, BridgeError> {
        let resp: KeygenResp = self
            .get_json("keygen", &format!("/thorchain/keygen/{height}/{pk}"))
            .await?;
        Ok(resp.keygen_block)
    }

    async fn broadcast(&self, tx: StdTx) -> Result<String, BridgeError> {
        let _timer = self.metrics.start_timer(names::SEND_TO_THORCHAIN_DURATION);
        let mut state = self.account.lock().await;
        self.refresh_account(&mut state).await?;

        let signed = self.sign_std_tx(&tx, &state)?;
        let body = self
            .http
            .post_json(
                "/txs",
                &BroadcastReq {
                    tx: &signed,
                    mode: "sync",
                },
            )
            .await
            .map_err(|e| {
                self.metrics
                    .inc_error(names::THORCHAIN_BRIDGE_ERROR, "fail_broadcast", "");
                BridgeError::from(e)
            })?;
        let result: BroadcastResult =
            serde_json::from_str(&body).map_err(|e| BridgeError::decode("broadcast result", e))?;

        if let Some(log) = result.failure() {
            self.metrics
                .inc_error(names::THORCHAIN_BRIDGE_ERROR, "broadcast_refused", "");
            let err = BridgeError::Refused {
                code: result.code,
                log,
                txhash: result.txhash,
            };
            if err.is_sequence_mismatch() {
                // re-read on the next broadcast; the local sequence stays the floor
                state.block_height = 0;
            }
            warn!(sequence = state.sequence, error = %err, "[bf-03] Broadcast refused");
            return Err(err);
        }

        state.sequence += 1;
        self.metrics.counter(names::TX_TO_THORCHAIN).inc();
        info!(txhash = %result.txhash, sequence = state.sequence, "[bf-03] Broadcast to thorchain");
        Ok(result.txhash)
    }
}
