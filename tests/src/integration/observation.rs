//! # Observation Scenarios
//!
//! External block → chain scanner → observer → registry filter →
//! `ObservedTxIn` broadcast to the consensus node.

#[cfg(test)]
mod tests {
    use crate::harness::{bnb, bnb_address, wait_until, Harness};
    use bf_01_block_scanner::{
        BlockScanner, BlockScannerConfig, KvScannerStorage, MockBlockFetcher, ScannerStorage,
    };
    use bf_03_thorchain_bridge::Msg;
    use bifrost_telemetry::names;
    use shared_storage::InMemoryKVStore;
    use shared_types::{Address, Chain, Coins, TxIn, TxInItem};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn inbound(height: i64, to: Address, memo: &str) -> TxIn {
        let mut block = TxIn::empty(Chain::bnb(), height);
        block.tx_array.push(TxInItem {
            block_height: height,
            tx: format!("{}E", "A".repeat(63)),
            sender: Address::new("tbnb1user"),
            to,
            coins: Coins::new(vec![bnb(100)]),
            memo: memo.to_string(),
            ..Default::default()
        });
        block
    }

    #[tokio::test]
    async fn test_inbound_to_vault_is_witnessed() {
        let h = Harness::new();
        let vault = h.signer_vault();
        h.bnb
            .fetcher()
            .insert_block(inbound(1, bnb_address(&vault), "SWAP:ASSET"));

        let observer = h.observer();
        observer.start().await.unwrap();
        h.bnb.fetcher().set_tip(1);

        let bridge = h.bridge.clone();
        assert!(wait_until(Duration::from_secs(5), || !bridge.broadcast_msgs().is_empty()).await);
        let storage = h.bnb.storage().clone();
        assert!(
            wait_until(Duration::from_secs(5), || {
                storage.get_scan_pos().unwrap_or(0) >= 1
                    && storage
                        .list_blocks_for_retry(false)
                        .map(|b| b.is_empty())
                        .unwrap_or(false)
            })
            .await
        );
        observer.stop().await;

        match h.bridge.broadcast_msgs().as_slice() {
            [Msg::ObservedTxIn(batch)] => {
                assert_eq!(batch.txs.len(), 1);
                let observed = &batch.txs[0];
                assert_eq!(observed.observed_pub_key, vault);
                assert_eq!(observed.block_height, 1);
                assert_eq!(observed.tx.memo, "SWAP:ASSET");
                assert_eq!(observed.tx.to_address, bnb_address(&vault));
            }
            other => panic!("unexpected messages {other:?}"),
        }
        assert_eq!(h.bnb.observed().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_witness_is_replayed() {
        let h = Harness::new();
        let vault = h.signer_vault();
        h.bnb
            .fetcher()
            .insert_block(inbound(1, bnb_address(&vault), "SWAP:ASSET"));
        h.bridge.set_broadcast_failing(true);

        let observer = h.observer();
        observer.start().await.unwrap();
        h.bnb.fetcher().set_tip(1);

        let storage = h.bnb.storage().clone();
        assert!(
            wait_until(Duration::from_secs(5), || {
                storage
                    .list_blocks_for_retry(true)
                    .map(|b| b.iter().any(|item| item.height == 1))
                    .unwrap_or(false)
            })
            .await
        );
        assert!(h.bridge.broadcast_msgs().is_empty());

        h.bridge.set_broadcast_failing(false);
        let bridge = h.bridge.clone();
        assert!(wait_until(Duration::from_secs(5), || !bridge.broadcast_msgs().is_empty()).await);
        assert!(
            wait_until(Duration::from_secs(5), || {
                storage
                    .list_blocks_for_retry(false)
                    .map(|b| b.is_empty())
                    .unwrap_or(false)
            })
            .await
        );
        observer.stop().await;

        match h.bridge.broadcast_msgs().as_slice() {
            [Msg::ObservedTxIn(batch)] => {
                assert_eq!(batch.txs[0].observed_pub_key, vault);
                assert_eq!(batch.txs[0].block_height, 1);
            }
            other => panic!("unexpected messages {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unrelated_inbound_is_ignored() {
        let h = Harness::new();
        h.signer_vault();
        h.bnb
            .fetcher()
            .insert_block(inbound(1, Address::new("tbnb1stranger"), "SWAP:ASSET"));

        let observer = h.observer();
        observer.start().await.unwrap();
        h.bnb.fetcher().set_tip(2);

        let storage = h.bnb.storage().clone();
        assert!(wait_until(Duration::from_secs(5), || storage.get_scan_pos().unwrap_or(0) >= 2).await);
        observer.stop().await;

        assert!(h.bridge.broadcast_msgs().is_empty());
    }

    #[tokio::test]
    async fn test_scanner_waits_at_tip() {
        let h = Harness::new();
        let fetcher = Arc::new(MockBlockFetcher::new(Chain::bnb(), 10));
        let storage: Arc<dyn ScannerStorage> =
            Arc::new(KvScannerStorage::new(Arc::new(InMemoryKVStore::new())));
        let config = BlockScannerConfig {
            start_block_height: 10,
            ..BlockScannerConfig::for_testing(Chain::bnb())
        };
        let scanner =
            BlockScanner::new(config, fetcher.clone(), storage.clone(), h.metrics.clone()).unwrap();
        assert_eq!(scanner.init_position(None).await.unwrap(), 10);

        let (tx, mut rx) = mpsc::channel(4);
        scanner.start(tx).unwrap();
        let watched = fetcher.clone();
        assert!(wait_until(Duration::from_secs(5), || watched.fetched().len() >= 3).await);
        scanner.stop().await;

        assert!(rx.try_recv().is_err());
        assert!(fetcher.fetched().iter().all(|height| *height == 11));
        assert_eq!(scanner.position().load(std::sync::atomic::Ordering::SeqCst), 10);
        let errors = h
            .metrics
            .counter_vec(names::BLOCK_SCAN_ERROR)
            .with_label_values(&["fail_get_block", "BNB"])
            .get();
        assert_eq!(errors, 0.0);
    }
}
