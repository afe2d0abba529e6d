//! Driving Ports (API offered by the signing store)

use crate::{SignerError, TxOutStoreItem};

/// Durable status of every signing instruction this node has seen.
///
/// Production: `KvSignerStore` over RocksDB
/// Testing: `KvSignerStore` over `InMemoryKVStore`
pub trait SignerStorage: Send + Sync {
    /// Insert or update a record. A status downgrade is rejected with
    /// `SignerError::StatusDowngrade`.
    fn set(&self, item: &TxOutStoreItem) -> Result<(), SignerError>;

    /// Record stored under `key`.
    fn get(&self, key: &str) -> Result<Option<TxOutStoreItem>, SignerError>;

    /// Whether `key` is stored.
    fn has(&self, key: &str) -> Result<bool, SignerError>;

    /// Every record, ascending by height then key. Unreadable records are
    /// skipped.
    fn list(&self) -> Result<Vec<TxOutStoreItem>, SignerError>;

    /// Forget `key`.
    fn remove(&self, key: &str) -> Result<(), SignerError>;

    /// Write several records atomically, with the same transition rules as
    /// [`SignerStorage::set`].
    fn batch(&self, items: &[TxOutStoreItem]) -> Result<(), SignerError>;
}
