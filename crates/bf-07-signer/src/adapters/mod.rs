//! Signing store and consensus fetcher adapters.

mod consensus_fetcher;
mod kv_store;

pub use consensus_fetcher::ConsensusFetcher;
pub use kv_store::KvSignerStore;
