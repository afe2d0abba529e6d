//! In-memory key/value store.

use crate::{BatchOperation, KVStoreError, KeyValueStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory store for unit tests and ephemeral runs.
///
/// Backed by a `BTreeMap` so prefix scans come back in key order, the same
/// as RocksDB. Writes can be made to fail to exercise error paths.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl InMemoryKVStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn check_writable(&self) -> Result<(), KVStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KVStoreError::io("writes disabled"));
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.check_writable()?;
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.check_writable()?;
        self.data.write().remove(key);
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.check_writable()?;
        let mut data = self.data.write();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let data = self.data.read();
        Ok(data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let store = InMemoryKVStore::new();
        store.put(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert!(store.exists(b"key1").unwrap());

        store.delete(b"key1").unwrap();
        assert!(!store.exists(b"key1").unwrap());
        store.delete(b"key1").unwrap();
    }

    #[test]
    fn test_prefix_scan_is_ordered_and_bounded() {
        let store = InMemoryKVStore::new();
        store.put(b"block-status-3", b"c").unwrap();
        store.put(b"block-status-1", b"a").unwrap();
        store.put(b"blockscanpos", b"9").unwrap();
        store.put(b"block-status-2", b"b").unwrap();

        let results = store.prefix_scan(b"block-status-").unwrap();
        let values: Vec<_> = results.into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_batch_write() {
        let store = InMemoryKVStore::new();
        store.put(b"gone", b"x").unwrap();
        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"a".to_vec(), b"1".to_vec()),
                BatchOperation::delete(b"gone".to_vec()),
            ])
            .unwrap();
        assert!(store.exists(b"a").unwrap());
        assert!(!store.exists(b"gone").unwrap());
    }

    #[test]
    fn test_fail_writes() {
        let store = InMemoryKVStore::new();
        store.set_fail_writes(true);
        assert!(store.put(b"a", b"1").is_err());
        assert!(store.is_empty());
        store.set_fail_writes(false);
        store.put(b"a", b"1").unwrap();
        assert_eq!(store.len(), 1);
    }
}
