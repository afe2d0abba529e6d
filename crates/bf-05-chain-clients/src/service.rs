//! # Chain Client Loader
//!
//! Builds one adapter per configured chain. A chain that fails to load is
//! logged and left out; the daemon runs with the rest.

use bf_02_pubkey_manager::PubKeyValidator;
use bf_03_thorchain_bridge::{Keys, ThorchainBridge};
use bf_04_tss::ThresholdSigner;
use bifrost_telemetry::Metrics;
use shared_storage::KeyValueStore;
use shared_types::Chain;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::adapters::{BinanceClient, BitcoinClient, EthereumClient, VaultSigner};
use crate::{ChainClient, ChainClientError, ChainConfiguration};

/// Collaborators every adapter is built with.
#[derive(Clone)]
pub struct ChainClientDeps {
    /// Node key
    pub keys: Keys,
    /// Consensus client (keysign parties, scan start heights)
    pub bridge: Arc<dyn ThorchainBridge>,
    /// Vault key registry
    pub registry: Arc<dyn PubKeyValidator>,
    /// Threshold signing service
    pub tss: Arc<dyn ThresholdSigner>,
    /// Metrics registry
    pub metrics: Arc<Metrics>,
}

impl ChainClientDeps {
    /// Digest signer choosing between the node key and the threshold
    /// service.
    pub fn vault_signer(&self) -> VaultSigner {
        VaultSigner::new(
            self.keys.clone(),
            Arc::clone(&self.tss),
            Arc::clone(&self.bridge),
        )
    }
}

/// Build the adapter for one chain. `db` holds its scanner state.
pub fn load_chain(
    config: &ChainConfiguration,
    deps: &ChainClientDeps,
    db: Arc<dyn KeyValueStore>,
) -> Result<Arc<dyn ChainClient>, ChainClientError> {
    let chain = &config.chain_id;
    if let Err(e) = deps.metrics.register_chain(chain.as_str()) {
        warn!(chain = %chain, error = %e, "[bf-05] Failed to register chain metrics");
    }
    let client: Arc<dyn ChainClient> = match chain.as_str() {
        Chain::BNB => Arc::new(BinanceClient::new(config, deps, db)?),
        Chain::BTC => Arc::new(BitcoinClient::new(config, deps, db)?),
        Chain::ETH => Arc::new(EthereumClient::new(config, deps, db)?),
        other => return Err(ChainClientError::UnsupportedChain(other.to_string())),
    };
    Ok(client)
}

/// Build every configured adapter. `open_db` supplies a dedicated store per
/// chain.
pub fn load_chains<F>(
    configs: &[ChainConfiguration],
    deps: &ChainClientDeps,
    mut open_db: F,
) -> HashMap<Chain, Arc<dyn ChainClient>>
where
    F: FnMut(&Chain) -> Result<Arc<dyn KeyValueStore>, ChainClientError>,
{
    let mut chains = HashMap::with_capacity(configs.len());
    for config in configs {
        let chain = config.chain_id.clone();
        if chains.contains_key(&chain) {
            warn!(chain = %chain, "[bf-05] Chain configured twice, keeping the first");
            continue;
        }
        let loaded = open_db(&chain).and_then(|db| load_chain(config, deps, db));
        match loaded {
            Ok(client) => {
                info!(chain = %chain, "[bf-05] Loaded chain client");
                chains.insert(chain, client);
            }
            Err(e) => error!(chain = %chain, error = %e, "[bf-05] Failed to load chain"),
        }
    }
    chains
}
