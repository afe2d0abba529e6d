//! # bf-01-block-scanner
//!
//! Durable scanner store (scan position and per-height status) and the
//! generic block-scanning engine used for every external chain and for the
//! consensus chain itself.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────┐ fetch_block(h) ┌─────────────┐   bounded mpsc   ┌──────────┐
//!   │ BlockFetcher │ ◄───────────── │ BlockScanner│ ───────────────► │ consumer │
//!   └──────────────┘                └──────┬──────┘                  └──────────┘
//!                                          │ pos / status
//!                                   ┌──────▼──────┐
//!                                   │ScannerStorage│ (KeyValueStore)
//!                                   └─────────────┘
//! ```
//!
//! Two tasks run per scanner:
//!
//! - **main loop**: fetches `pos + 1`, persists the new position, then hands
//!   the block downstream. "Not yet produced" backs off silently.
//! - **retry loop**: replays tracked heights at or below the position. The
//!   first pass after start replays `processing` and `failed` heights, later
//!   passes only `failed` ones.
//!
//! ## Example
//!
//! ```rust,ignore
//! let scanner = BlockScanner::new(config, fetcher, storage, metrics)?;
//! scanner.init_position(Some(&bridge)).await?;
//! scanner.start(tx_in_sender)?;
//! // ...
//! scanner.stop().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::KvScannerStorage;
pub use domain::{BlockScanStatus, BlockScannerConfig, BlockStatusItem, FetchError, ScannerError};
pub use ports::inbound::ScannerStorage;
pub use ports::outbound::{BlockFetcher, ConsensusHeightSource, MockBlockFetcher, MockHeightSource};
pub use service::BlockScanner;

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
