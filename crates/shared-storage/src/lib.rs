//! # Shared Storage
//!
//! A small ordered key/value port and its two implementations.
//!
//! ## Module Structure
//!
//! ```text
//! shared-storage/
//! ├── kv.rs        # KeyValueStore trait, BatchOperation
//! ├── memory.rs    # InMemoryKVStore (tests, ephemeral runs)
//! ├── rocks.rs     # RocksDbStore (feature `rocksdb`)
//! └── errors.rs    # KVStoreError
//! ```
//!
//! Stores take `&self` on every operation and synchronise internally, so a
//! single store can be shared as `Arc<dyn KeyValueStore>` between the tasks
//! of one component.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod kv;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocks;

pub use errors::KVStoreError;
pub use kv::{BatchOperation, KeyValueStore};
pub use memory::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use rocks::{RocksDbConfig, RocksDbStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
