//! # Keygen Scenarios
//!
//! A consensus keygen assignment produces a vault the node immediately
//! signs for and observes.

#[cfg(test)]
mod tests {
    use crate::harness::{bnb, new_vault, wait_until, Harness, NETWORK};
    use bf_02_pubkey_manager::PubKeyValidator;
    use bf_03_thorchain_bridge::Msg;
    use shared_types::{Address, Chain, Coins, Keygen, KeygenBlock, KeygenType, TxIn, TxInItem};
    use std::time::Duration;

    #[tokio::test]
    async fn test_new_vault_is_signed_for_and_observed() {
        let h = Harness::new();
        let node = new_vault();
        h.registry.add_node_pubkey(node.clone());
        let peer = new_vault();
        h.bridge.set_block_height(40);
        h.bridge.insert_keygen(
            41,
            node.clone(),
            KeygenBlock {
                height: 41,
                keygens: vec![Keygen {
                    members: vec![node.clone(), peer.clone()],
                    keygen_type: KeygenType::AsgardKeygen,
                }],
            },
        );

        let signer = h.signer();
        signer.start().await.unwrap();
        h.bridge.set_block_height(41);
        let bridge = h.bridge.clone();
        assert!(wait_until(Duration::from_secs(5), || !bridge.broadcast_msgs().is_empty()).await);
        signer.stop().await;

        let pool = match h.bridge.broadcast_msgs().as_slice() {
            [Msg::TssPool(msg)] => msg.clone(),
            other => panic!("unexpected messages {other:?}"),
        };
        assert!(pool.blame.is_empty());
        assert_eq!(pool.height, 41);
        assert_eq!(pool.chains, vec![Chain::bnb()]);
        assert_eq!(h.tss.keygen_calls(), vec![vec![node, peer]]);

        let vault = pool.pool_pub_key;
        assert!(h.registry.has_pubkey(&vault));
        assert!(h.registry.get_signers().contains(&vault));
        let address = vault.get_address(&Chain::bnb(), NETWORK).unwrap();
        assert_eq!(
            h.registry.is_valid_vault_address(&address, &Chain::bnb()),
            Some(vault.clone())
        );

        // the first deposit into the new vault is witnessed
        let mut block = TxIn::empty(Chain::bnb(), 1);
        block.tx_array.push(TxInItem {
            block_height: 1,
            tx: "B".repeat(64),
            sender: Address::new("tbnb1user"),
            to: address,
            coins: Coins::new(vec![bnb(5_000)]),
            memo: "ADD:BNB.BNB".to_string(),
            ..Default::default()
        });
        h.bnb.fetcher().insert_block(block);
        let observer = h.observer();
        observer.start().await.unwrap();
        h.bnb.fetcher().set_tip(1);
        let bridge = h.bridge.clone();
        assert!(wait_until(Duration::from_secs(5), || bridge.broadcast_msgs().len() >= 2).await);
        observer.stop().await;

        match &h.bridge.broadcast_msgs()[1] {
            Msg::ObservedTxIn(batch) => assert_eq!(batch.txs[0].observed_pub_key, vault),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blamed_keygen_registers_nothing() {
        let h = Harness::new();
        let node = new_vault();
        h.registry.add_node_pubkey(node.clone());
        h.tss
            .set_keygen_blame(Some(shared_types::Blame::new("keygen timeout", &["tthorpub1n2"])));

        let keygen = Keygen {
            members: vec![node, new_vault()],
            keygen_type: KeygenType::AsgardKeygen,
        };
        let coordinator = h.keygen();
        assert_eq!(coordinator.process_keygen(50, &keygen).await.unwrap(), None);

        match h.bridge.broadcast_msgs().as_slice() {
            [Msg::TssPool(msg)] => {
                assert!(msg.pool_pub_key.is_empty());
                assert_eq!(msg.blame.blame_nodes[0].pubkey, "tthorpub1n2");
            }
            other => panic!("unexpected messages {other:?}"),
        }
        assert!(h.registry.get_signers().is_empty());
    }

    #[test]
    fn test_vault_addresses_are_distinct() {
        let vaults: Vec<_> = (0..8).map(|_| new_vault()).collect();
        for chain in [Chain::bnb(), Chain::btc(), Chain::eth()] {
            let mut addresses: Vec<Address> = vaults
                .iter()
                .map(|v| v.get_address(&chain, NETWORK).unwrap())
                .collect();
            assert_eq!(
                vaults[0].get_address(&chain, NETWORK).unwrap(),
                addresses[0]
            );
            addresses.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            addresses.dedup();
            assert_eq!(addresses.len(), vaults.len(), "collision on {chain}");
        }
    }
}
