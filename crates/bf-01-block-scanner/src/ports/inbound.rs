//! Driving Ports (API offered by the scanner store)

use crate::{BlockScanStatus, BlockStatusItem, ScannerError};

/// Durable scan position and per-height status for one chain.
///
/// Production: `KvScannerStorage` over RocksDB
/// Testing: `KvScannerStorage` over `InMemoryKVStore`
pub trait ScannerStorage: Send + Sync {
    /// Last height handed downstream; 0 when nothing is stored.
    fn get_scan_pos(&self) -> Result<i64, ScannerError>;

    /// Persist the scan position. Durable before return.
    fn set_scan_pos(&self, height: i64) -> Result<(), ScannerError>;

    /// Track `height` with `status`.
    fn set_block_status(&self, height: i64, status: BlockScanStatus) -> Result<(), ScannerError>;

    /// Status of `height`; `None` when untracked.
    fn get_block_status(&self, height: i64) -> Result<Option<BlockScanStatus>, ScannerError>;

    /// Stop tracking `height`.
    fn clear_block_status(&self, height: i64) -> Result<(), ScannerError>;

    /// Tracked heights in ascending order; `failed_only` filters to failures.
    fn list_blocks_for_retry(&self, failed_only: bool) -> Result<Vec<BlockStatusItem>, ScannerError>;
}
