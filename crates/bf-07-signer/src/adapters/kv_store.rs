//! Signing store over the shared key/value port.
//!
//! Keys: `txoutitem-<hex>` (JSON `TxOutStoreItem`). With a passphrase every
//! value is AES-GCM sealed (`nonce || ciphertext`).

use shared_crypto::{open, seal, SecretKey};
use shared_storage::{BatchOperation, KeyValueStore};
use std::sync::Arc;
use tracing::warn;

use crate::{SignerError, SignerStorage, TxOutStoreItem, TX_OUT_PREFIX};

/// `SignerStorage` backed by any `KeyValueStore`.
pub struct KvSignerStore {
    db: Arc<dyn KeyValueStore>,
    key: Option<SecretKey>,
}

impl KvSignerStore {
    /// Plain store over `db`.
    pub fn new(db: Arc<dyn KeyValueStore>) -> Self {
        Self { db, key: None }
    }

    /// Store sealing records with a key derived from `passphrase`. An empty
    /// passphrase gives a plain store.
    pub fn with_passphrase(db: Arc<dyn KeyValueStore>, passphrase: &str) -> Self {
        let key = (!passphrase.is_empty()).then(|| SecretKey::from_passphrase(passphrase));
        Self { db, key }
    }

    fn encode(&self, item: &TxOutStoreItem) -> Result<Vec<u8>, SignerError> {
        let buf = serde_json::to_vec(item).map_err(|e| SignerError::Corrupt {
            key: item.key(),
            message: e.to_string(),
        })?;
        match &self.key {
            Some(key) => Ok(seal(key, &buf)?),
            None => Ok(buf),
        }
    }

    fn decode(&self, key: &str, buf: &[u8]) -> Result<TxOutStoreItem, SignerError> {
        let plain = match &self.key {
            Some(secret) => open(secret, buf)?,
            None => buf.to_vec(),
        };
        serde_json::from_slice(&plain).map_err(|e| SignerError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    fn check_transition(&self, item: &TxOutStoreItem) -> Result<String, SignerError> {
        let key = item.key();
        if let Some(stored) = self.get(&key)? {
            if !stored.status.can_become(item.status) {
                return Err(SignerError::StatusDowngrade {
                    key,
                    from: stored.status,
                    to: item.status,
                });
            }
        }
        Ok(key)
    }
}

impl SignerStorage for KvSignerStore {
    fn set(&self, item: &TxOutStoreItem) -> Result<(), SignerError> {
        let key = self.check_transition(item)?;
        self.db.put(key.as_bytes(), &self.encode(item)?)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<TxOutStoreItem>, SignerError> {
        self.db
            .get(key.as_bytes())?
            .map(|buf| self.decode(key, &buf))
            .transpose()
    }

    fn has(&self, key: &str) -> Result<bool, SignerError> {
        Ok(self.db.exists(key.as_bytes())?)
    }

    fn list(&self) -> Result<Vec<TxOutStoreItem>, SignerError> {
        let mut results = Vec::new();
        for (key, buf) in self.db.prefix_scan(TX_OUT_PREFIX.as_bytes())? {
            if buf.is_empty() {
                continue;
            }
            let key = String::from_utf8_lossy(&key).to_string();
            match self.decode(&key, &buf) {
                Ok(item) => results.push(item),
                Err(e) => warn!(key = %key, error = %e, "[bf-07] Skipping unreadable signer record"),
            }
        }
        // height first so every node walks its backlog in the same order
        results.sort_by(|a, b| a.height.cmp(&b.height).then_with(|| a.key().cmp(&b.key())));
        Ok(results)
    }

    fn remove(&self, key: &str) -> Result<(), SignerError> {
        self.db.delete(key.as_bytes())?;
        Ok(())
    }

    fn batch(&self, items: &[TxOutStoreItem]) -> Result<(), SignerError> {
        let mut ops = Vec::with_capacity(items.len());
        for item in items {
            let key = self.check_transition(item)?;
            ops.push(BatchOperation::put(key.into_bytes(), self.encode(item)?));
        }
        if !ops.is_empty() {
            self.db.atomic_batch_write(ops)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TxStatus;
    use shared_storage::InMemoryKVStore;
    use shared_types::{Address, Asset, Chain, Coin, Coins, PubKey, TxOutItem};

    fn record(height: i64, memo: &str) -> TxOutStoreItem {
        TxOutStoreItem::new(
            height,
            TxOutItem {
                chain: Chain::bnb(),
                to_address: Address::new("tbnb1recipient"),
                vault_pubkey: PubKey::new_unchecked("tthorpub1vault"),
                coins: Coins::new(vec![Coin::new(Asset::new(Chain::bnb(), "BNB"), 5)]),
                memo: memo.to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_set_get_remove() {
        let store = KvSignerStore::new(Arc::new(InMemoryKVStore::new()));
        let item = record(3, "OUTBOUND:A");
        assert!(!store.has(&item.key()).unwrap());

        store.set(&item).unwrap();
        assert!(store.has(&item.key()).unwrap());
        assert_eq!(store.get(&item.key()).unwrap(), Some(item.clone()));

        store.remove(&item.key()).unwrap();
        assert_eq!(store.get(&item.key()).unwrap(), None);
    }

    #[test]
    fn test_downgrade_rejected() {
        let store = KvSignerStore::new(Arc::new(InMemoryKVStore::new()));
        let mut item = record(3, "OUTBOUND:A");
        item.status = TxStatus::Spent;
        store.set(&item).unwrap();

        item.status = TxStatus::Available;
        assert!(matches!(
            store.set(&item),
            Err(SignerError::StatusDowngrade { .. })
        ));
        assert!(store.batch(&[item.clone()]).is_err());
        assert_eq!(store.get(&item.key()).unwrap().unwrap().status, TxStatus::Spent);
    }

    #[test]
    fn test_list_order() {
        let store = KvSignerStore::new(Arc::new(InMemoryKVStore::new()));
        store
            .batch(&[record(12, "b"), record(2, "a"), record(12, "a"), record(7, "c")])
            .unwrap();
        let heights: Vec<i64> = store.list().unwrap().iter().map(|i| i.height).collect();
        assert_eq!(heights, vec![2, 7, 12, 12]);
        let listed = store.list().unwrap();
        assert!(listed[2].key() < listed[3].key());
    }

    #[test]
    fn test_sealed_records() {
        let db: Arc<dyn KeyValueStore> = Arc::new(InMemoryKVStore::new());
        let sealed = KvSignerStore::with_passphrase(Arc::clone(&db), "hunter2");
        let item = record(4, "OUTBOUND:SECRET");
        sealed.set(&item).unwrap();

        let raw = db.get(item.key().as_bytes()).unwrap().unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("OUTBOUND:SECRET"));
        assert_eq!(sealed.get(&item.key()).unwrap(), Some(item.clone()));

        // wrong passphrase: point reads fail, listing skips
        let wrong = KvSignerStore::with_passphrase(Arc::clone(&db), "nope");
        assert!(wrong.get(&item.key()).is_err());
        assert!(wrong.list().unwrap().is_empty());
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let item = record(9, "OUTBOUND:DURABLE");
        {
            let db: Arc<dyn KeyValueStore> =
                Arc::new(shared_storage::RocksDbStore::open_default(dir.path()).unwrap());
            let store = KvSignerStore::with_passphrase(db, "hunter2");
            let mut done = item.clone();
            done.status = TxStatus::Processed;
            store.set(&done).unwrap();
        }
        let db: Arc<dyn KeyValueStore> =
            Arc::new(shared_storage::RocksDbStore::open_default(dir.path()).unwrap());
        let store = KvSignerStore::with_passphrase(db, "hunter2");
        let reopened = store.get(&item.key()).unwrap().unwrap();
        assert_eq!(reopened.status, TxStatus::Processed);
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
