//! Per-height scan status records.

use serde::{Deserialize, Serialize};

/// Scan status of one height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockScanStatus {
    /// Fetched and on its way downstream
    Processing,
    /// Fetch or hand-off failed; replayed by the retry loop
    Failed,
    /// Scheduled but not attempted yet
    NotStarted,
}

/// Stored value under `block-status-<height>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStatusItem {
    /// Height
    pub height: i64,
    /// Status
    pub status: BlockScanStatus,
}

impl BlockStatusItem {
    /// Create a record.
    pub fn new(height: i64, status: BlockScanStatus) -> Self {
        Self { height, status }
    }
}
