//! Bridge views for the scanner and the registry.

use async_trait::async_trait;
use bf_01_block_scanner::ConsensusHeightSource;
use bf_02_pubkey_manager::{PubKeyManagerError, VaultPubKeySource, VaultPubKeys};
use shared_types::Chain;
use std::sync::Arc;

use crate::ThorchainBridge;

/// Start-height hints for chain scanners.
#[derive(Clone)]
pub struct BridgeHeightSource(pub Arc<dyn ThorchainBridge>);

#[async_trait]
impl ConsensusHeightSource for BridgeHeightSource {
    async fn wait_to_catch_up(&self) -> Result<(), String> {
        self.0.wait_to_catch_up().await.map_err(|e| e.to_string())
    }

    async fn block_height(&self) -> Result<i64, String> {
        self.0.get_block_height().await.map_err(|e| e.to_string())
    }

    async fn last_observed_in_height(&self, chain: &Chain) -> Result<i64, String> {
        self.0
            .get_last_observed_in_height(chain)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Vault key list for the registry refresh loop.
#[derive(Clone)]
pub struct BridgePubKeySource(pub Arc<dyn ThorchainBridge>);

#[async_trait]
impl VaultPubKeySource for BridgePubKeySource {
    async fn get_vault_pubkeys(&self) -> Result<VaultPubKeys, PubKeyManagerError> {
        self.0
            .get_pubkeys()
            .await
            .map_err(|e| PubKeyManagerError::FetchFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockThorchainBridge;
    use shared_types::{Address, ChainNetwork, PubKey};

    #[tokio::test]
    async fn test_height_source() {
        let bridge = Arc::new(MockThorchainBridge::new(
            Address::new("tthor1node"),
            ChainNetwork::Testnet,
        ));
        bridge.set_block_height(40);
        bridge.set_last_observed_in(Chain::bnb(), 77);
        let source = BridgeHeightSource(bridge.clone());

        source.wait_to_catch_up().await.unwrap();
        assert_eq!(source.block_height().await.unwrap(), 40);
        assert_eq!(source.last_observed_in_height(&Chain::bnb()).await.unwrap(), 77);
        assert_eq!(source.last_observed_in_height(&Chain::btc()).await.unwrap(), 0);

        bridge.set_query_failing(true);
        assert!(source.block_height().await.is_err());
    }

    #[tokio::test]
    async fn test_pubkey_source() {
        let bridge = Arc::new(MockThorchainBridge::new(
            Address::new("tthor1node"),
            ChainNetwork::Testnet,
        ));
        let asgard = PubKey::new_unchecked("tthorpub1asgard");
        bridge.set_vault_pubkeys(VaultPubKeys {
            asgard: vec![asgard.clone()],
            yggdrasil: vec![],
        });
        let source = BridgePubKeySource(bridge.clone());
        assert_eq!(source.get_vault_pubkeys().await.unwrap().asgard, vec![asgard]);

        bridge.set_query_failing(true);
        assert!(matches!(
            source.get_vault_pubkeys().await,
            Err(PubKeyManagerError::FetchFailed(_))
        ));
    }
}
