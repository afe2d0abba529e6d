//! Driving Ports (API offered to scanners, observer, signer and keygen)

use async_trait::async_trait;
use bf_02_pubkey_manager::{PubKeyValidator, VaultPubKeys};
use parking_lot::RwLock;
use shared_types::{
    Address, Blame, Chain, ChainNetwork, Coins, KeygenBlock, KeygenType, PubKey, PubKeys,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    BridgeError, ChainsTxOut, KeysignFailMsg, Msg, NodeAccount, ObservedTx, ObservedTxBatch,
    StdTx, TssPoolMsg,
};

/// Attempts made by [`ThorchainBridge::ensure_node_whitelisted`] at startup.
pub const WHITELIST_ATTEMPTS: u32 = 300;

/// Delay between whitelist polls.
pub const WHITELIST_INTERVAL: Duration = Duration::from_secs(5);

/// Client of the local consensus node.
#[async_trait]
pub trait ThorchainBridge: Send + Sync {
    /// The node's consensus account address.
    fn signer_address(&self) -> Address;

    /// Network addresses are derived for.
    fn network(&self) -> ChainNetwork;

    /// Block until the consensus node reports its tip.
    async fn wait_to_catch_up(&self) -> Result<(), BridgeError>;

    /// Consensus tip.
    async fn get_block_height(&self) -> Result<i64, BridgeError>;

    /// Highest `chain` height consensus has witnessed.
    async fn get_last_observed_in_height(&self, chain: &Chain) -> Result<i64, BridgeError>;

    /// Highest consensus height whose `chain` outbound was signed.
    async fn get_last_signed_out_height(&self, chain: &Chain) -> Result<i64, BridgeError>;

    /// Node account record.
    async fn get_node_account(&self, address: &Address) -> Result<NodeAccount, BridgeError>;

    /// Current asgard and yggdrasil keys.
    async fn get_pubkeys(&self) -> Result<VaultPubKeys, BridgeError>;

    /// Threshold party holding shares of `vault`.
    async fn get_keysign_party(&self, vault: &PubKey) -> Result<PubKeys, BridgeError>;

    /// Outbound instructions for `pk` at consensus `height`.
    async fn get_keysign(&self, height: i64, pk: &PubKey) -> Result<ChainsTxOut, BridgeError>;

    /// Keygen instructions for `pk` at `height`; height 0 means not yet
    /// available.
    async fn get_keygen_block(&self, height: i64, pk: &PubKey)
        -> Result<KeygenBlock, BridgeError>;

    /// Sign and post `tx`, returning its hash.
    async fn broadcast(&self, tx: StdTx) -> Result<String, BridgeError>;

    /// One transaction holding at most one inbound and one outbound
    /// observation message. Direction comes from the observed vault's
    /// address on the tx's chain.
    fn get_observations_std_tx(&self, txs: &[ObservedTx]) -> Result<StdTx, BridgeError> {
        if txs.is_empty() {
            return Err(BridgeError::NothingToSign);
        }
        let network = self.network();
        let mut inbound = Vec::new();
        let mut outbound = Vec::new();
        for observed in txs {
            let vault = observed
                .observed_pub_key
                .get_address(&observed.tx.chain, network)?;
            if observed.tx.to_address == vault {
                inbound.push(observed.clone());
            } else if observed.tx.from_address == vault {
                outbound.push(observed.clone());
            } else {
                return Err(BridgeError::UnknownDirection(observed.tx.id.clone()));
            }
        }

        let signer = self.signer_address();
        let mut msgs = Vec::with_capacity(2);
        if !inbound.is_empty() {
            msgs.push(Msg::ObservedTxIn(ObservedTxBatch {
                txs: inbound,
                signer: signer.clone(),
            }));
        }
        if !outbound.is_empty() {
            msgs.push(Msg::ObservedTxOut(ObservedTxBatch {
                txs: outbound,
                signer,
            }));
        }
        Ok(StdTx::new(msgs))
    }

    /// Keygen result report.
    fn get_keygen_std_tx(
        &self,
        pool_pub_key: PubKey,
        blame: Blame,
        members: PubKeys,
        keygen_type: KeygenType,
        chains: Vec<Chain>,
        height: i64,
    ) -> StdTx {
        StdTx::new(vec![Msg::TssPool(TssPoolMsg::new(
            pool_pub_key,
            keygen_type,
            members,
            height,
            blame,
            chains,
            self.signer_address(),
        ))])
    }

    /// Blame report for a failed keysign.
    fn get_keysign_fail_std_tx(
        &self,
        height: i64,
        blame: Blame,
        memo: String,
        coins: Coins,
        pub_key: PubKey,
    ) -> StdTx {
        StdTx::new(vec![Msg::KeysignFail(KeysignFailMsg::new(
            height,
            blame,
            memo,
            coins,
            pub_key,
            self.signer_address(),
        ))])
    }

    /// Poll the node account until it carries a secp256k1 key, then
    /// register its signer memberships and the node key itself.
    async fn ensure_node_whitelisted(
        &self,
        registry: &dyn PubKeyValidator,
        attempts: u32,
        interval: Duration,
    ) -> Result<(), BridgeError> {
        let address = self.signer_address();
        for attempt in 1..=attempts {
            match self.get_node_account(&address).await {
                Ok(na) if na.has_keys() => {
                    for pk in &na.signer_membership {
                        registry.add_pubkey(pk.clone(), true);
                    }
                    registry.add_node_pubkey(na.pub_key_set.secp256k1.clone());
                    info!(
                        address = %address,
                        status = ?na.status,
                        memberships = na.signer_membership.len(),
                        "[bf-03] Node account is whitelisted"
                    );
                    return Ok(());
                }
                Ok(_) => {
                    info!(address = %address, attempt, "[bf-03] Waiting for node account keys");
                }
                Err(e) => {
                    warn!(address = %address, attempt, error = %e, "[bf-03] Failed to get node account");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Err(BridgeError::NotWhitelisted(address.to_string()))
    }
}

/// In-memory consensus node for tests.
pub struct MockThorchainBridge {
    signer: Address,
    network: ChainNetwork,
    block_height: AtomicI64,
    last_observed_in: RwLock<HashMap<Chain, i64>>,
    last_signed_out: RwLock<HashMap<Chain, i64>>,
    node_account: RwLock<NodeAccount>,
    vault_pubkeys: RwLock<VaultPubKeys>,
    keysign_party: RwLock<HashMap<PubKey, PubKeys>>,
    keysign: RwLock<HashMap<(i64, PubKey), ChainsTxOut>>,
    keygen: RwLock<HashMap<(i64, PubKey), KeygenBlock>>,
    broadcasts: RwLock<Vec<StdTx>>,
    fail_broadcast: AtomicBool,
    broadcast_delay: RwLock<Duration>,
    fail_queries: AtomicBool,
}

impl MockThorchainBridge {
    /// Mock whose node account address is `signer`.
    pub fn new(signer: Address, network: ChainNetwork) -> Self {
        Self {
            signer,
            network,
            block_height: AtomicI64::new(1),
            last_observed_in: RwLock::new(HashMap::new()),
            last_signed_out: RwLock::new(HashMap::new()),
            node_account: RwLock::new(NodeAccount::default()),
            vault_pubkeys: RwLock::new(VaultPubKeys::default()),
            keysign_party: RwLock::new(HashMap::new()),
            keysign: RwLock::new(HashMap::new()),
            keygen: RwLock::new(HashMap::new()),
            broadcasts: RwLock::new(Vec::new()),
            fail_broadcast: AtomicBool::new(false),
            broadcast_delay: RwLock::new(Duration::ZERO),
            fail_queries: AtomicBool::new(false),
        }
    }

    /// Move the consensus tip.
    pub fn set_block_height(&self, height: i64) {
        self.block_height.store(height, Ordering::SeqCst);
    }

    /// Set the last witnessed height of `chain`.
    pub fn set_last_observed_in(&self, chain: Chain, height: i64) {
        self.last_observed_in.write().insert(chain, height);
    }

    /// Set the last signed consensus height of `chain`.
    pub fn set_last_signed_out(&self, chain: Chain, height: i64) {
        self.last_signed_out.write().insert(chain, height);
    }

    /// Replace the node account record.
    pub fn set_node_account(&self, na: NodeAccount) {
        *self.node_account.write() = na;
    }

    /// Replace the vault key list.
    pub fn set_vault_pubkeys(&self, keys: VaultPubKeys) {
        *self.vault_pubkeys.write() = keys;
    }

    /// Set the threshold party of `vault`.
    pub fn set_keysign_party(&self, vault: PubKey, party: PubKeys) {
        self.keysign_party.write().insert(vault, party);
    }

    /// Serve `out` for `(height, pk)`.
    pub fn insert_keysign(&self, height: i64, pk: PubKey, out: ChainsTxOut) {
        self.keysign.write().insert((height, pk), out);
    }

    /// Serve `block` for `(height, pk)`.
    pub fn insert_keygen(&self, height: i64, pk: PubKey, block: KeygenBlock) {
        self.keygen.write().insert((height, pk), block);
    }

    /// Make broadcasts fail.
    pub fn set_broadcast_failing(&self, fail: bool) {
        self.fail_broadcast.store(fail, Ordering::SeqCst);
    }

    /// Hold every broadcast for `delay` before answering.
    pub fn set_broadcast_delay(&self, delay: Duration) {
        *self.broadcast_delay.write() = delay;
    }

    /// Make every query fail.
    pub fn set_query_failing(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Transactions broadcast so far.
    pub fn broadcasts(&self) -> Vec<StdTx> {
        self.broadcasts.read().clone()
    }

    /// Messages of every broadcast, in order.
    pub fn broadcast_msgs(&self) -> Vec<Msg> {
        self.broadcasts
            .read()
            .iter()
            .flat_map(|tx| tx.msg.iter().cloned())
            .collect()
    }

    fn check_queries(&self) -> Result<(), BridgeError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(BridgeError::Http(crate::HttpError::Transport {
                url: "mock".to_string(),
                message: "mock failure".to_string(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl ThorchainBridge for MockThorchainBridge {
    fn signer_address(&self) -> Address {
        self.signer.clone()
    }

    fn network(&self) -> ChainNetwork {
        self.network
    }

    async fn wait_to_catch_up(&self) -> Result<(), BridgeError> {
        self.check_queries()
    }

    async fn get_block_height(&self) -> Result<i64, BridgeError> {
        self.check_queries()?;
        Ok(self.block_height.load(Ordering::SeqCst))
    }

    async fn get_last_observed_in_height(&self, chain: &Chain) -> Result<i64, BridgeError> {
        self.check_queries()?;
        Ok(self.last_observed_in.read().get(chain).copied().unwrap_or(0))
    }

    async fn get_last_signed_out_height(&self, chain: &Chain) -> Result<i64, BridgeError> {
        self.check_queries()?;
        Ok(self.last_signed_out.read().get(chain).copied().unwrap_or(0))
    }

    async fn get_node_account(&self, _address: &Address) -> Result<NodeAccount, BridgeError> {
        self.check_queries()?;
        Ok(self.node_account.read().clone())
    }

    async fn get_pubkeys(&self) -> Result<VaultPubKeys, BridgeError> {
        self.check_queries()?;
        Ok(self.vault_pubkeys.read().clone())
    }

    async fn get_keysign_party(&self, vault: &PubKey) -> Result<PubKeys, BridgeError> {
        self.check_queries()?;
        Ok(self.keysign_party.read().get(vault).cloned().unwrap_or_default())
    }

    async fn get_keysign(&self, height: i64, pk: &PubKey) -> Result<ChainsTxOut, BridgeError> {
        self.check_queries()?;
        Ok(self
            .keysign
            .read()
            .get(&(height, pk.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_keygen_block(
        &self,
        height: i64,
        pk: &PubKey,
    ) -> Result<KeygenBlock, BridgeError> {
        self.check_queries()?;
        Ok(self
            .keygen
            .read()
            .get(&(height, pk.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn broadcast(&self, tx: StdTx) -> Result<String, BridgeError> {
        let delay = *self.broadcast_delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err(BridgeError::Refused {
                code: 1,
                log: "mock refusal".to_string(),
                txhash: String::new(),
            });
        }
        let mut broadcasts = self.broadcasts.write();
        broadcasts.push(tx);
        Ok(format!("{:064X}", broadcasts.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PubKeySet;
    use bf_02_pubkey_manager::{MockVaultPubKeySource, PubKeyManager};
    use bifrost_telemetry::Metrics;
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::{Asset, Coin, TxInItem};
    use std::sync::Arc;

    fn vault(network: ChainNetwork) -> PubKey {
        PubKey::from_secp256k1(&Secp256k1KeyPair::generate().public_key(), network).unwrap()
    }

    fn observed(vault: &PubKey, from: Address, to: Address) -> ObservedTx {
        let item = TxInItem {
            block_height: 3,
            tx: format!("{from}-{to}"),
            sender: from,
            to,
            coins: Coins::new(vec![Coin::new(Asset::new(Chain::bnb(), "BNB"), 1)]),
            observed_vault_pubkey: vault.clone(),
            ..Default::default()
        };
        ObservedTx::from_item(&Chain::bnb(), &item)
    }

    fn bridge() -> MockThorchainBridge {
        MockThorchainBridge::new(Address::new("tthor1node"), ChainNetwork::Testnet)
    }

    #[test]
    fn test_observations_are_partitioned() {
        let bridge = bridge();
        let pk = vault(ChainNetwork::Testnet);
        let addr = pk.get_address(&Chain::bnb(), ChainNetwork::Testnet).unwrap();
        let txs = vec![
            observed(&pk, Address::new("tbnb1user"), addr.clone()),
            observed(&pk, addr.clone(), Address::new("tbnb1user")),
            observed(&pk, Address::new("tbnb1other"), addr),
        ];

        let tx = bridge.get_observations_std_tx(&txs).unwrap();
        assert_eq!(tx.msg.len(), 2);
        match &tx.msg[0] {
            Msg::ObservedTxIn(batch) => {
                assert_eq!(batch.txs.len(), 2);
                assert_eq!(batch.signer, Address::new("tthor1node"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &tx.msg[1] {
            Msg::ObservedTxOut(batch) => assert_eq!(batch.txs.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(tx.fee.gas, crate::WITNESS_GAS);
        assert!(tx.fee.amount.is_empty());
    }

    #[test]
    fn test_inbound_only_batch() {
        let bridge = bridge();
        let pk = vault(ChainNetwork::Testnet);
        let addr = pk.get_address(&Chain::bnb(), ChainNetwork::Testnet).unwrap();
        let tx = bridge
            .get_observations_std_tx(&[observed(&pk, Address::new("tbnb1user"), addr)])
            .unwrap();
        assert_eq!(tx.msg.len(), 1);
        assert!(matches!(tx.msg[0], Msg::ObservedTxIn(_)));
    }

    #[test]
    fn test_observation_errors() {
        let bridge = bridge();
        assert!(matches!(
            bridge.get_observations_std_tx(&[]),
            Err(BridgeError::NothingToSign)
        ));

        let pk = vault(ChainNetwork::Testnet);
        let stray = observed(&pk, Address::new("tbnb1a"), Address::new("tbnb1b"));
        assert!(matches!(
            bridge.get_observations_std_tx(&[stray]),
            Err(BridgeError::UnknownDirection(_))
        ));
    }

    #[test]
    fn test_keygen_and_keysign_fail_builders() {
        let bridge = bridge();
        let pool = vault(ChainNetwork::Testnet);
        let tx = bridge.get_keygen_std_tx(
            pool.clone(),
            Blame::default(),
            vec![pool.clone()],
            KeygenType::AsgardKeygen,
            vec![Chain::bnb()],
            10,
        );
        match &tx.msg[0] {
            Msg::TssPool(msg) => {
                assert_eq!(msg.pool_pub_key, pool);
                assert_eq!(msg.height, 10);
                assert_eq!(msg.signer, Address::new("tthor1node"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let tx = bridge.get_keysign_fail_std_tx(
            4,
            Blame::new("timeout", &["tthorpub1x"]),
            "outbound:ABC".to_string(),
            Coins::default(),
            pool,
        );
        assert!(matches!(tx.msg[0], Msg::KeysignFail(_)));
    }

    #[tokio::test]
    async fn test_ensure_node_whitelisted() {
        let bridge = bridge();
        let node_pk = vault(ChainNetwork::Testnet);
        let member = vault(ChainNetwork::Testnet);
        bridge.set_node_account(NodeAccount {
            node_address: Address::new("tthor1node"),
            status: crate::NodeStatus::Active,
            pub_key_set: PubKeySet {
                secp256k1: node_pk.clone(),
                ed25519: PubKey::default(),
            },
            signer_membership: vec![member.clone()],
        });
        let registry = PubKeyManager::new(
            ChainNetwork::Testnet,
            Arc::new(MockVaultPubKeySource::default()),
            Arc::new(Metrics::new().unwrap()),
        );

        bridge
            .ensure_node_whitelisted(&registry, 3, Duration::from_millis(1))
            .await
            .unwrap();
        assert!(registry.get_signers().contains(&member));
        assert_eq!(registry.get_node_pubkey(), Some(node_pk));
    }

    #[tokio::test]
    async fn test_ensure_node_whitelisted_gives_up() {
        let bridge = bridge();
        let registry = PubKeyManager::new(
            ChainNetwork::Testnet,
            Arc::new(MockVaultPubKeySource::default()),
            Arc::new(Metrics::new().unwrap()),
        );
        let err = bridge
            .ensure_node_whitelisted(&registry, 2, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotWhitelisted(_)));
    }

    #[tokio::test]
    async fn test_mock_records_broadcasts() {
        let bridge = bridge();
        let hash = bridge.broadcast(StdTx::new(vec![])).await.unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(bridge.broadcasts().len(), 1);

        bridge.set_broadcast_failing(true);
        assert!(bridge.broadcast(StdTx::new(vec![])).await.is_err());
    }
}
