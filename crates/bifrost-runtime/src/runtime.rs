//! # Bifrost Runtime
//!
//! Builds and starts every component in dependency order and stops them in
//! reverse.
//!
//! ## Startup Sequence
//!
//! 1. Metrics registry and `/metrics` listener
//! 2. Node key and consensus bridge
//! 3. Vault key registry, seeded once the node account is whitelisted
//! 4. Threshold service client
//! 5. Chain adapters, each with its own scanner store
//! 6. Observer (starts the chain scanners)
//! 7. Signer (consensus scanner, signing loop, keygen coordinator)

use anyhow::{Context, Result};
use bf_02_pubkey_manager::PubKeyManager;
use bf_03_thorchain_bridge::{
    BridgePubKeySource, Keys, ThorchainBridge, ThorchainBridgeClient, WHITELIST_ATTEMPTS,
    WHITELIST_INTERVAL,
};
use bf_04_tss::{ThresholdSigner, TssClient};
use bf_05_chain_clients::{load_chains, ChainClient, ChainClientDeps, ChainClientError};
use bf_06_observer::{Observer, DEFAULT_QUEUE_CAPACITY};
use bf_07_signer::{Signer, SignerDeps};
use bifrost_telemetry::{Metrics, MetricsServer};
use shared_storage::{KeyValueStore, RocksDbStore};
use shared_types::Chain;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::BifrostConfig;

/// The running daemon.
pub struct Bifrost {
    metrics: Arc<Metrics>,
    metrics_server: Option<MetricsServer>,
    registry: Arc<PubKeyManager>,
    chains: HashMap<Chain, Arc<dyn ChainClient>>,
    observer: Arc<Observer>,
    signer: Arc<Signer>,
}

impl Bifrost {
    /// Build and start every component.
    pub async fn start(config: BifrostConfig) -> Result<Self> {
        info!("===========================================");
        info!("  Bifrost v{}", crate::VERSION);
        info!("  Network: {:?}", config.network);
        info!("===========================================");

        let metrics = Arc::new(Metrics::new().context("Failed to create metrics registry")?);
        let metrics_server = if config.metrics.enabled {
            let server = MetricsServer::start(Arc::clone(&metrics), &config.metrics.server_config())
                .await
                .context("Failed to start metrics server")?;
            info!(addr = %server.local_addr(), "Metrics server listening");
            Some(server)
        } else {
            None
        };

        let network = config.network;
        let keys = Keys::load(&config.thorchain, network).context("Failed to load node key")?;
        let bridge: Arc<dyn ThorchainBridge> = Arc::new(
            ThorchainBridgeClient::new(config.thorchain.clone(), keys.clone(), Arc::clone(&metrics))
                .context("Failed to create thorchain bridge")?,
        );

        let registry = Arc::new(PubKeyManager::new(
            network,
            Arc::new(BridgePubKeySource(Arc::clone(&bridge))),
            Arc::clone(&metrics),
        ));
        bridge
            .ensure_node_whitelisted(registry.as_ref(), WHITELIST_ATTEMPTS, WHITELIST_INTERVAL)
            .await
            .context("Node account is not whitelisted")?;
        registry
            .start()
            .await
            .context("Failed to load vault pubkeys")?;

        let tss: Arc<dyn ThresholdSigner> =
            Arc::new(TssClient::new(&config.tss).context("Failed to create tss client")?);
        match tss.p2p_id().await {
            Ok(id) => info!(p2p_id = %id, "Threshold service reachable"),
            Err(e) => warn!(error = %e, "Failed to get threshold service p2p id"),
        }

        let deps = ChainClientDeps {
            keys,
            bridge: Arc::clone(&bridge),
            registry: registry.clone(),
            tss: Arc::clone(&tss),
            metrics: Arc::clone(&metrics),
        };
        let db_paths: HashMap<Chain, PathBuf> = config
            .chains
            .iter()
            .map(|c| (c.chain_id.clone(), chain_db_path(&c.block_scanner.db_path, &c.chain_id)))
            .collect();
        let chains = load_chains(&config.chains, &deps, |chain| {
            let path = db_paths
                .get(chain)
                .cloned()
                .unwrap_or_else(|| chain_db_path("observer_data", chain));
            let db: Arc<dyn KeyValueStore> = Arc::new(RocksDbStore::open_default(path)?);
            Ok::<_, ChainClientError>(db)
        });
        if chains.is_empty() {
            warn!("No chain client loaded, nothing will be observed or signed");
        }

        let queue_capacity = config
            .chains
            .iter()
            .map(|c| c.block_scanner.block_scan_processors)
            .max()
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);
        let observer = Arc::new(
            Observer::new(
                registry.clone(),
                chains.clone(),
                Arc::clone(&bridge),
                Arc::clone(&metrics),
            )
            .with_queue_capacity(queue_capacity),
        );
        observer.start().await.context("Failed to start observer")?;

        let signer_db: Arc<dyn KeyValueStore> = Arc::new(
            RocksDbStore::open_default(&config.signer.signer_db_path)
                .context("Failed to open signer store")?,
        );
        let signer = Arc::new(
            Signer::new(
                config.signer.clone(),
                signer_db,
                chains.clone(),
                config.keygen_chains(),
                SignerDeps {
                    bridge,
                    registry: registry.clone(),
                    tss,
                    metrics: Arc::clone(&metrics),
                },
            )
            .context("Failed to create signer")?,
        );
        signer.start().await.context("Failed to start signer")?;

        info!(chains = chains.len(), "Bifrost started");
        Ok(Self {
            metrics,
            metrics_server,
            registry,
            chains,
            observer,
            signer,
        })
    }

    /// Chains with a running adapter.
    pub fn chains(&self) -> Vec<Chain> {
        let mut chains: Vec<Chain> = self.chains.keys().cloned().collect();
        chains.sort();
        chains
    }

    /// Shared metrics registry.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Stop every component, newest first.
    pub async fn stop(mut self) {
        info!("Initiating graceful shutdown...");
        self.signer.stop().await;
        self.observer.stop().await;
        self.registry.stop().await;
        if let Some(mut server) = self.metrics_server.take() {
            server.stop().await;
        }
        info!("Shutdown complete");
    }
}

/// Store directory of `chain` under `base`.
pub fn chain_db_path(base: &str, chain: &Chain) -> PathBuf {
    PathBuf::from(base).join(chain.as_str().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_db_path() {
        assert_eq!(
            chain_db_path("observer_data", &Chain::btc()),
            PathBuf::from("observer_data").join("btc")
        );
    }
}
