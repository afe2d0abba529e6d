//! Scanner domain: configuration, height status records and errors.

pub mod config;
pub mod errors;
pub mod status;

pub use config::BlockScannerConfig;
pub use errors::{FetchError, ScannerError};
pub use status::{BlockScanStatus, BlockStatusItem};
