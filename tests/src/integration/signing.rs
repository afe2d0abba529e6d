//! # Signing Scenarios
//!
//! Consensus keysign → signer store → chain adapter sign/broadcast, with
//! restarts, blame and yggdrasil returns.

#[cfg(test)]
mod tests {
    use crate::harness::{bnb, bnb_address, outbound, wait_until, Harness};
    use bf_03_thorchain_bridge::{ChainsTxOut, Msg};
    use bf_05_chain_clients::{Account, ChainClient, ChainClientError};
    use bf_07_signer::{ConsensusBlock, Signer, TxOutStoreItem, TxStatus};
    use shared_types::{
        Asset, Blame, Chain, Coin, Coins, PubKey, TxOut, TxOutItem, MEMO_YGGDRASIL_RETURN,
    };
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn keysign(h: &Harness, height: i64, vault: &PubKey, items: Vec<TxOutItem>) {
        let mut chains = BTreeMap::new();
        chains.insert(
            Chain::bnb(),
            TxOut {
                height,
                tx_array: items,
            },
        );
        h.bridge
            .insert_keysign(height, vault.clone(), ChainsTxOut { chains });
    }

    fn stored(signer: &Signer, record: &TxOutStoreItem) -> TxOutStoreItem {
        signer.store().get(&record.key()).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_restart_after_broadcast_does_not_resend() {
        let h = Harness::new();
        let vault = h.signer_vault();
        let item = outbound(&vault, "OUTBOUND:AAAA", 100);
        h.bridge.set_block_height(6);
        let block = ConsensusBlock {
            height: 6,
            tx_outs: vec![TxOut {
                height: 6,
                tx_array: vec![item.clone()],
            }],
            keygen: None,
        };

        // the previous process filed the instruction and broadcast it, then
        // died before recording the outcome
        {
            let crashed = h.signer();
            assert_eq!(crashed.process_consensus_block(&block).unwrap(), 1);
            let payload = h.bnb.sign(&item, 6).await.unwrap();
            h.bnb.broadcast(&item, &payload).await.unwrap();
        }
        let record = TxOutStoreItem::new(6, item.clone());

        // consensus has since seen the outbound
        let mut done = item;
        done.out_hash = "F".repeat(64);
        keysign(&h, 6, &vault, vec![done]);

        let restarted = h.signer();
        assert_eq!(stored(&restarted, &record).status, TxStatus::Available);
        restarted.process_transactions().await.unwrap();
        assert_eq!(stored(&restarted, &record).status, TxStatus::Spent);
        assert_eq!(h.bnb.broadcasts().len(), 1);
        assert_eq!(h.bnb.signed().len(), 1);
    }

    #[tokio::test]
    async fn test_threshold_blame_is_reported_once() {
        let h = Harness::new();
        let vault = h.signer_vault();
        let item = outbound(&vault, "OUTBOUND:BBBB", 100);
        h.bridge.set_block_height(9);
        keysign(&h, 10, &vault, vec![item.clone()]);
        h.bnb.push_sign_result(Err(ChainClientError::Blame(Blame::new(
            "signers timed out",
            &["tthorpub1n3"],
        ))));

        let signer = h.signer();
        signer.start().await.unwrap();
        h.bridge.set_block_height(10);
        let bridge = h.bridge.clone();
        assert!(wait_until(Duration::from_secs(5), || !bridge.broadcast_msgs().is_empty()).await);
        // several signing rounds pass while the record is held back
        tokio::time::sleep(Duration::from_millis(200)).await;

        let record = TxOutStoreItem::new(10, item);
        match h.bridge.broadcast_msgs().as_slice() {
            [Msg::KeysignFail(msg)] => {
                assert_eq!(msg.height, 10);
                assert_eq!(msg.blame.blame_nodes.len(), 1);
                assert_eq!(msg.blame.blame_nodes[0].pubkey, "tthorpub1n3");
                assert_eq!(msg.pub_key, vault);
            }
            other => panic!("unexpected messages {other:?}"),
        }
        let held = stored(&signer, &record);
        assert_eq!(held.status, TxStatus::Available);
        assert_eq!(held.blame_height, 10);
        assert!(h.bnb.broadcasts().is_empty());

        // a new consensus block releases the hold and the retry succeeds
        h.bridge.set_block_height(11);
        let bnb_client = h.bnb.clone();
        assert!(wait_until(Duration::from_secs(5), || !bnb_client.broadcasts().is_empty()).await);
        signer.stop().await;
        assert_eq!(h.bnb.broadcasts().len(), 1);
        assert_eq!(h.bridge.broadcast_msgs().len(), 1);
    }

    #[tokio::test]
    async fn test_yggdrasil_return_sends_balance_minus_gas() {
        let h = Harness::new();
        let vault = h.signer_vault();
        let rune = Asset::new(Chain::bnb(), "RUNE-67C");
        h.bnb.set_account(
            bnb_address(&vault),
            Account {
                coins: Coins::new(vec![bnb(1_000_000), Coin::new(rune.clone(), 500_000)]),
                ..Default::default()
            },
        );
        h.bnb.set_gas(Coins::new(vec![bnb(30_000)]));
        let mut ygg = outbound(&vault, MEMO_YGGDRASIL_RETURN, 0);
        ygg.coins = Coins::default();
        h.bridge.set_block_height(20);
        keysign(&h, 21, &vault, vec![ygg]);

        let signer = h.signer();
        signer.start().await.unwrap();
        h.bridge.set_block_height(21);
        let bnb_client = h.bnb.clone();
        assert!(wait_until(Duration::from_secs(5), || !bnb_client.broadcasts().is_empty()).await);
        signer.stop().await;

        let signed = h.bnb.signed();
        assert_eq!(signed.len(), 1);
        let bnb_asset = Chain::bnb().gas_asset();
        assert_eq!(signed[0].coins.get(&bnb_asset), 970_000);
        assert_eq!(signed[0].coins.get(&rune), 500_000);
    }

    #[tokio::test]
    async fn test_repeated_passes_broadcast_once() {
        let h = Harness::new();
        let vault = h.signer_vault();
        let items = vec![
            outbound(&vault, "OUTBOUND:CCCC", 100),
            outbound(&vault, "OUTBOUND:DDDD", 200),
        ];
        let signer = h.signer();
        let block = ConsensusBlock {
            height: 30,
            tx_outs: vec![TxOut {
                height: 30,
                tx_array: items.clone(),
            }],
            keygen: None,
        };
        assert_eq!(signer.process_consensus_block(&block).unwrap(), 2);
        h.bridge.set_block_height(30);

        signer.process_transactions().await.unwrap();
        signer.process_transactions().await.unwrap();
        assert_eq!(signer.process_consensus_block(&block).unwrap(), 0);
        signer.process_transactions().await.unwrap();

        assert_eq!(h.bnb.broadcasts().len(), 2);
        for item in items {
            let record = TxOutStoreItem::new(30, item);
            assert_eq!(stored(&signer, &record).status, TxStatus::Processed);
        }
    }
}
