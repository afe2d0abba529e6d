//! Fixtures shared by the adapter tests.

use axum::Router;
use bf_02_pubkey_manager::{MockVaultPubKeySource, PubKeyManager, PubKeyValidator, VaultPubKeys};
use bf_03_thorchain_bridge::{Keys, MockThorchainBridge};
use bf_04_tss::MockTssServer;
use bifrost_telemetry::Metrics;
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Address, ChainNetwork, PubKey};
use std::sync::Arc;

use crate::ChainClientDeps;

/// Serve `router` on an ephemeral port, returning its base url.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub struct Deps {
    pub deps: ChainClientDeps,
    pub registry: Arc<PubKeyManager>,
    pub tss: Arc<MockTssServer>,
    pub bridge: Arc<MockThorchainBridge>,
}

impl Deps {
    pub fn node_pubkey(&self) -> PubKey {
        self.deps.keys.pubkey().unwrap()
    }
}

/// Testnet dependencies around a fresh node key.
pub fn deps() -> Deps {
    let keys = Keys::new(Secp256k1KeyPair::generate(), ChainNetwork::Testnet);
    let metrics = Arc::new(Metrics::new().unwrap());
    let bridge = Arc::new(MockThorchainBridge::new(
        Address::new("tthor1node"),
        ChainNetwork::Testnet,
    ));
    let registry = Arc::new(PubKeyManager::new(
        ChainNetwork::Testnet,
        Arc::new(MockVaultPubKeySource::new(VaultPubKeys::default())),
        Arc::clone(&metrics),
    ));
    let tss = Arc::new(MockTssServer::new(ChainNetwork::Testnet));
    let deps = ChainClientDeps {
        keys,
        bridge: bridge.clone(),
        registry: registry.clone() as Arc<dyn PubKeyValidator>,
        tss: tss.clone(),
        metrics,
    };
    Deps {
        deps,
        registry,
        tss,
        bridge,
    }
}
