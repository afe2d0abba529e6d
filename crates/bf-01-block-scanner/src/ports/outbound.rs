//! Driven Ports (what the scanner needs)

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Chain, TxIn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use crate::FetchError;

/// Source of blocks for one chain.
///
/// Chain adapters produce `TxIn`; the consensus-side scanner produces
/// signing and keygen instructions.
#[async_trait]
pub trait BlockFetcher: Send + Sync + 'static {
    /// What one height turns into.
    type Block: Send + 'static;

    /// Chain being scanned.
    fn chain(&self) -> Chain;

    /// Current tip.
    async fn get_height(&self) -> Result<i64, FetchError>;

    /// Fetch one height. Heights above the tip fail with
    /// `FetchError::HeightNotYetProduced`.
    async fn fetch_block(&self, height: i64) -> Result<Self::Block, FetchError>;

    /// Empty blocks are counted but not sent downstream.
    fn is_empty(block: &Self::Block) -> bool;
}

/// Consensus-side hints for the start height.
#[async_trait]
pub trait ConsensusHeightSource: Send + Sync {
    /// Block until the consensus node reports a height.
    async fn wait_to_catch_up(&self) -> Result<(), String>;

    /// Current consensus height.
    async fn block_height(&self) -> Result<i64, String>;

    /// Highest external height witnessed for `chain`.
    async fn last_observed_in_height(&self, chain: &Chain) -> Result<i64, String>;
}

/// In-memory fetcher for tests.
///
/// Heights above `tip` are not produced; heights in the failure set fail;
/// everything else returns the stored block or an empty one.
pub struct MockBlockFetcher {
    chain: Chain,
    tip: AtomicI64,
    blocks: RwLock<HashMap<i64, TxIn>>,
    failing: RwLock<HashSet<i64>>,
    fetches: RwLock<Vec<i64>>,
    tip_queries: AtomicUsize,
}

impl MockBlockFetcher {
    /// Create a fetcher for `chain` with the given tip.
    pub fn new(chain: Chain, tip: i64) -> Self {
        Self {
            chain,
            tip: AtomicI64::new(tip),
            blocks: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            fetches: RwLock::new(Vec::new()),
            tip_queries: AtomicUsize::new(0),
        }
    }

    /// Move the tip.
    pub fn set_tip(&self, tip: i64) {
        self.tip.store(tip, Ordering::SeqCst);
    }

    /// Serve `block` at its height.
    pub fn insert_block(&self, block: TxIn) {
        self.blocks.write().insert(block.block_height, block);
    }

    /// Make `height` fail (or succeed again).
    pub fn set_failing(&self, height: i64, failing: bool) {
        if failing {
            self.failing.write().insert(height);
        } else {
            self.failing.write().remove(&height);
        }
    }

    /// Heights requested so far, in call order.
    pub fn fetched(&self) -> Vec<i64> {
        self.fetches.read().clone()
    }

    /// Number of `get_height` calls.
    pub fn tip_queries(&self) -> usize {
        self.tip_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockFetcher for MockBlockFetcher {
    type Block = TxIn;

    fn chain(&self) -> Chain {
        self.chain.clone()
    }

    async fn get_height(&self) -> Result<i64, FetchError> {
        self.tip_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.tip.load(Ordering::SeqCst))
    }

    async fn fetch_block(&self, height: i64) -> Result<TxIn, FetchError> {
        self.fetches.write().push(height);
        if height > self.tip.load(Ordering::SeqCst) {
            return Err(FetchError::HeightNotYetProduced(height));
        }
        if self.failing.read().contains(&height) {
            return Err(FetchError::Failed(format!("mock failure at {}", height)));
        }
        Ok(self
            .blocks
            .read()
            .get(&height)
            .cloned()
            .unwrap_or_else(|| TxIn::empty(self.chain.clone(), height)))
    }

    fn is_empty(block: &TxIn) -> bool {
        block.is_empty()
    }
}

/// Fixed consensus heights for tests.
#[derive(Debug, Default)]
pub struct MockHeightSource {
    /// Returned by `block_height`
    pub block_height: i64,
    /// Returned by `last_observed_in_height`
    pub last_observed: i64,
    /// Make every call fail
    pub should_fail: bool,
}

#[async_trait]
impl ConsensusHeightSource for MockHeightSource {
    async fn wait_to_catch_up(&self) -> Result<(), String> {
        if self.should_fail {
            return Err("consensus unavailable".to_string());
        }
        Ok(())
    }

    async fn block_height(&self) -> Result<i64, String> {
        Ok(self.block_height)
    }

    async fn last_observed_in_height(&self, _chain: &Chain) -> Result<i64, String> {
        Ok(self.last_observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fetcher_tip() {
        let fetcher = MockBlockFetcher::new(Chain::bnb(), 10);
        assert!(fetcher.fetch_block(10).await.is_ok());
        let err = fetcher.fetch_block(11).await.unwrap_err();
        assert!(err.is_not_yet_produced());

        fetcher.set_failing(5, true);
        assert!(matches!(
            fetcher.fetch_block(5).await,
            Err(FetchError::Failed(_))
        ));
        assert_eq!(fetcher.fetched(), vec![10, 11, 5]);
    }
}
