//! Scanner store over the shared key/value port.
//!
//! Keys: `blockscanpos` (JSON integer) and `block-status-<height>` (JSON
//! `BlockStatusItem`).

use shared_storage::{KeyValueStore, KVStoreError};
use std::sync::Arc;

use crate::{BlockScanStatus, BlockStatusItem, ScannerError, ScannerStorage};

const SCAN_POS_KEY: &[u8] = b"blockscanpos";
const BLOCK_STATUS_PREFIX: &str = "block-status-";

fn block_status_key(height: i64) -> Vec<u8> {
    format!("{}{}", BLOCK_STATUS_PREFIX, height).into_bytes()
}

/// `ScannerStorage` backed by any `KeyValueStore`.
pub struct KvScannerStorage {
    db: Arc<dyn KeyValueStore>,
}

impl KvScannerStorage {
    /// Wrap a store. The store should be dedicated to one chain.
    pub fn new(db: Arc<dyn KeyValueStore>) -> Self {
        Self { db }
    }
}

impl ScannerStorage for KvScannerStorage {
    fn get_scan_pos(&self) -> Result<i64, ScannerError> {
        match self.db.get(SCAN_POS_KEY)? {
            None => Ok(0),
            Some(buf) => serde_json::from_slice(&buf).map_err(|e| ScannerError::Corrupt {
                key: "blockscanpos".to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn set_scan_pos(&self, height: i64) -> Result<(), ScannerError> {
        self.db.put(SCAN_POS_KEY, height.to_string().as_bytes())?;
        Ok(())
    }

    fn set_block_status(&self, height: i64, status: BlockScanStatus) -> Result<(), ScannerError> {
        let buf = serde_json::to_vec(&BlockStatusItem::new(height, status)).map_err(|e| {
            ScannerError::Storage(KVStoreError::io(format!(
                "fail to marshal block status: {}",
                e
            )))
        })?;
        self.db.put(&block_status_key(height), &buf)?;
        Ok(())
    }

    fn get_block_status(&self, height: i64) -> Result<Option<BlockScanStatus>, ScannerError> {
        match self.db.get(&block_status_key(height))? {
            None => Ok(None),
            Some(buf) if buf.is_empty() => Ok(None),
            Some(buf) => {
                let item: BlockStatusItem =
                    serde_json::from_slice(&buf).map_err(|e| ScannerError::Corrupt {
                        key: format!("{}{}", BLOCK_STATUS_PREFIX, height),
                        message: e.to_string(),
                    })?;
                Ok(Some(item.status))
            }
        }
    }

    fn clear_block_status(&self, height: i64) -> Result<(), ScannerError> {
        self.db.delete(&block_status_key(height))?;
        Ok(())
    }

    fn list_blocks_for_retry(&self, failed_only: bool) -> Result<Vec<BlockStatusItem>, ScannerError> {
        let mut results = Vec::new();
        for (key, buf) in self.db.prefix_scan(BLOCK_STATUS_PREFIX.as_bytes())? {
            if buf.is_empty() {
                continue;
            }
            let item: BlockStatusItem =
                serde_json::from_slice(&buf).map_err(|e| ScannerError::Corrupt {
                    key: String::from_utf8_lossy(&key).to_string(),
                    message: e.to_string(),
                })?;
            if failed_only && item.status != BlockScanStatus::Failed {
                continue;
            }
            results.push(item);
        }
        // keys sort lexically ("-10" before "-2")
        results.sort_by_key(|item| item.height);
        Ok(results)
    }
}
