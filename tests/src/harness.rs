//! Shared wiring for the scenarios: real observer, signer, keygen
//! coordinator and registry over the mock consensus node, threshold service
//! and BNB adapter.

use bf_02_pubkey_manager::{MockVaultPubKeySource, PubKeyManager, PubKeyValidator, VaultPubKeys};
use bf_03_thorchain_bridge::MockThorchainBridge;
use bf_04_tss::MockTssServer;
use bf_05_chain_clients::{ChainClient, MockChainClient};
use bf_06_observer::Observer;
use bf_07_signer::{KeygenCoordinator, Signer, SignerConfig, SignerDeps};
use bifrost_telemetry::Metrics;
use shared_crypto::Secp256k1KeyPair;
use shared_storage::{InMemoryKVStore, KeyValueStore};
use shared_types::{Address, Asset, Chain, ChainNetwork, Coin, Coins, PubKey, TxOutItem};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Network every scenario runs on.
pub const NETWORK: ChainNetwork = ChainNetwork::Testnet;

/// Components under test and their mock collaborators.
pub struct Harness {
    /// Shared metrics registry
    pub metrics: Arc<Metrics>,
    /// Consensus node
    pub bridge: Arc<MockThorchainBridge>,
    /// Vault key registry
    pub registry: Arc<PubKeyManager>,
    /// Threshold service
    pub tss: Arc<MockTssServer>,
    /// BNB adapter
    pub bnb: Arc<MockChainClient>,
    /// Signer store; survives signer restarts
    pub signer_db: Arc<dyn KeyValueStore>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Fresh wiring with an empty registry.
    pub fn new() -> Self {
        let metrics = Arc::new(Metrics::new().expect("metrics"));
        metrics.register_chain(Chain::BNB).expect("bnb metrics");
        let bridge = Arc::new(MockThorchainBridge::new(Address::new("tthor1node"), NETWORK));
        let registry = Arc::new(PubKeyManager::new(
            NETWORK,
            Arc::new(MockVaultPubKeySource::new(VaultPubKeys::default())),
            metrics.clone(),
        ));
        let bnb = Arc::new(
            MockChainClient::new(Chain::bnb(), NETWORK, metrics.clone())
                .with_registry(registry.clone()),
        );
        Self {
            tss: Arc::new(MockTssServer::new(NETWORK)),
            signer_db: Arc::new(InMemoryKVStore::new()),
            metrics,
            bridge,
            registry,
            bnb,
        }
    }

    /// Adapters by chain.
    pub fn chains(&self) -> HashMap<Chain, Arc<dyn ChainClient>> {
        let mut chains: HashMap<Chain, Arc<dyn ChainClient>> = HashMap::new();
        chains.insert(Chain::bnb(), self.bnb.clone());
        chains
    }

    /// A new vault this node signs for.
    pub fn signer_vault(&self) -> PubKey {
        let pk = new_vault();
        self.registry.add_pubkey(pk.clone(), true);
        pk
    }

    /// Observer over the BNB adapter.
    pub fn observer(&self) -> Arc<Observer> {
        Arc::new(Observer::new(
            self.registry.clone(),
            self.chains(),
            self.bridge.clone(),
            self.metrics.clone(),
        ))
    }

    /// Signer over `signer_db`. Building a second one simulates a restart.
    pub fn signer(&self) -> Arc<Signer> {
        let deps = SignerDeps {
            bridge: self.bridge.clone(),
            registry: self.registry.clone(),
            tss: self.tss.clone(),
            metrics: self.metrics.clone(),
        };
        Arc::new(
            Signer::new(
                SignerConfig::for_testing(),
                self.signer_db.clone(),
                self.chains(),
                vec![Chain::bnb()],
                deps,
            )
            .expect("signer"),
        )
    }

    /// Keygen coordinator reporting BNB.
    pub fn keygen(&self) -> KeygenCoordinator {
        KeygenCoordinator::new(
            self.bridge.clone(),
            self.registry.clone(),
            self.tss.clone(),
            self.metrics.clone(),
            vec![Chain::bnb()],
        )
    }
}

/// Vault key backed by a fresh secp256k1 key.
pub fn new_vault() -> PubKey {
    PubKey::from_secp256k1(&Secp256k1KeyPair::generate().public_key(), NETWORK).expect("vault")
}

/// `vault`'s BNB address.
pub fn bnb_address(vault: &PubKey) -> Address {
    vault.get_address(&Chain::bnb(), NETWORK).expect("address")
}

/// BNB amount.
pub fn bnb(amount: u64) -> Coin {
    Coin::new(Asset::new(Chain::bnb(), "BNB"), amount)
}

/// Outbound instruction paying `amount` BNB from `vault`.
pub fn outbound(vault: &PubKey, memo: &str, amount: u64) -> TxOutItem {
    TxOutItem {
        chain: Chain::bnb(),
        to_address: Address::new("tbnb1recipient"),
        vault_pubkey: vault.clone(),
        coins: Coins::new(vec![bnb(amount)]),
        memo: memo.to_string(),
        in_hash: "C".repeat(64),
        ..Default::default()
    }
}

/// Poll `done` every 10ms for at most `timeout`.
pub async fn wait_until(timeout: Duration, done: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while !done() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    true
}
