//! Consensus chain as a block source.
//!
//! One height turns into the keysign batches of every signer key plus the
//! keygen assignments of the node key. Plugging this into the generic
//! `BlockScanner` gives the consensus-side scanner its position store,
//! not-yet-produced back-off and failed-height replay.

use async_trait::async_trait;
use bf_01_block_scanner::{BlockFetcher, FetchError};
use bf_02_pubkey_manager::PubKeyValidator;
use bf_03_thorchain_bridge::ThorchainBridge;
use shared_types::{Chain, TxOut};
use std::sync::Arc;
use tracing::debug;

use crate::ConsensusBlock;

/// `BlockFetcher` over the consensus REST API.
pub struct ConsensusFetcher {
    bridge: Arc<dyn ThorchainBridge>,
    registry: Arc<dyn PubKeyValidator>,
}

impl ConsensusFetcher {
    /// Fetcher reading instructions for the keys in `registry`.
    pub fn new(bridge: Arc<dyn ThorchainBridge>, registry: Arc<dyn PubKeyValidator>) -> Self {
        Self { bridge, registry }
    }
}

#[async_trait]
impl BlockFetcher for ConsensusFetcher {
    type Block = ConsensusBlock;

    fn chain(&self) -> Chain {
        Chain::thor()
    }

    async fn get_height(&self) -> Result<i64, FetchError> {
        self.bridge
            .get_block_height()
            .await
            .map_err(|e| FetchError::Failed(e.to_string()))
    }

    async fn fetch_block(&self, height: i64) -> Result<ConsensusBlock, FetchError> {
        let tip = self.get_height().await?;
        if height > tip {
            return Err(FetchError::HeightNotYetProduced(height));
        }

        let mut block = ConsensusBlock {
            height,
            ..Default::default()
        };
        for pk in self.registry.get_signers() {
            if pk.is_empty() {
                continue;
            }
            let keysign = self
                .bridge
                .get_keysign(height, &pk)
                .await
                .map_err(|e| FetchError::Failed(format!("fail to get keysign: {e}")))?;
            for (chain, out) in keysign.chains {
                if out.tx_array.is_empty() {
                    debug!(chain = %chain, height, "[bf-07] Nothing to process");
                    continue;
                }
                block.tx_outs.push(TxOut {
                    height,
                    tx_array: out.tx_array,
                });
            }
        }

        if let Some(node_pk) = self.registry.get_node_pubkey() {
            let keygen = self
                .bridge
                .get_keygen_block(height, &node_pk)
                .await
                .map_err(|e| FetchError::Failed(format!("fail to get keygen: {e}")))?;
            // height 0: nothing assigned at this height
            if keygen.height > 0 && !keygen.keygens.is_empty() {
                block.keygen = Some(keygen);
            }
        }
        Ok(block)
    }

    fn is_empty(block: &ConsensusBlock) -> bool {
        block.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bf_02_pubkey_manager::{MockVaultPubKeySource, PubKeyManager, VaultPubKeys};
    use bf_03_thorchain_bridge::{ChainsTxOut, MockThorchainBridge};
    use bifrost_telemetry::Metrics;
    use shared_types::{
        Address, ChainNetwork, Keygen, KeygenBlock, KeygenType, PubKey, TxOutItem,
    };
    use std::collections::BTreeMap;

    fn setup() -> (ConsensusFetcher, Arc<MockThorchainBridge>, Arc<PubKeyManager>) {
        let bridge = Arc::new(MockThorchainBridge::new(
            Address::new("tthor1node"),
            ChainNetwork::Testnet,
        ));
        let registry = Arc::new(PubKeyManager::new(
            ChainNetwork::Testnet,
            Arc::new(MockVaultPubKeySource::new(VaultPubKeys::default())),
            Arc::new(Metrics::new().unwrap()),
        ));
        let fetcher = ConsensusFetcher::new(bridge.clone(), registry.clone());
        (fetcher, bridge, registry)
    }

    fn out(vault: &PubKey, memo: &str) -> TxOut {
        TxOut {
            height: 0,
            tx_array: vec![TxOutItem {
                chain: Chain::bnb(),
                to_address: Address::new("tbnb1recipient"),
                vault_pubkey: vault.clone(),
                memo: memo.to_string(),
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn test_not_yet_produced() {
        let (fetcher, bridge, _) = setup();
        bridge.set_block_height(5);
        assert_eq!(
            fetcher.fetch_block(6).await,
            Err(FetchError::HeightNotYetProduced(6))
        );
        assert!(fetcher.fetch_block(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reads_every_signer_and_node_keygen() {
        let (fetcher, bridge, registry) = setup();
        bridge.set_block_height(10);
        let asgard = PubKey::new_unchecked("tthorpub1asgard");
        let node = PubKey::new_unchecked("tthorpub1node");
        let watched = PubKey::new_unchecked("tthorpub1watched");
        registry.add_pubkey(asgard.clone(), true);
        registry.add_pubkey(watched.clone(), false);
        registry.add_node_pubkey(node.clone());

        let mut chains = BTreeMap::new();
        chains.insert(Chain::bnb(), out(&asgard, "OUTBOUND:1"));
        chains.insert(Chain::btc(), TxOut::default());
        bridge.insert_keysign(8, asgard.clone(), ChainsTxOut { chains });
        let mut chains = BTreeMap::new();
        chains.insert(Chain::bnb(), out(&watched, "OUTBOUND:2"));
        bridge.insert_keysign(8, watched, ChainsTxOut { chains });
        bridge.insert_keygen(
            8,
            node.clone(),
            KeygenBlock {
                height: 8,
                keygens: vec![Keygen {
                    members: vec![node.clone()],
                    keygen_type: KeygenType::AsgardKeygen,
                }],
            },
        );

        let block = fetcher.fetch_block(8).await.unwrap();
        assert_eq!(block.height, 8);
        assert_eq!(block.tx_outs.len(), 1);
        assert_eq!(block.tx_outs[0].height, 8);
        assert_eq!(block.tx_outs[0].tx_array[0].memo, "OUTBOUND:1");
        assert_eq!(block.keygen.unwrap().keygens.len(), 1);
    }

    #[tokio::test]
    async fn test_query_failure_is_fetch_failure() {
        let (fetcher, bridge, registry) = setup();
        registry.add_pubkey(PubKey::new_unchecked("tthorpub1asgard"), true);
        bridge.set_block_height(3);
        bridge.set_query_failing(true);
        assert!(matches!(
            fetcher.fetch_block(2).await,
            Err(FetchError::Failed(_))
        ));
    }
}
