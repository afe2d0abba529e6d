//! Scanner store adapters.

mod kv_storage;

pub use kv_storage::KvScannerStorage;
