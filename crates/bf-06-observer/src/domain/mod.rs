//! Observer domain: errors and the conversion of scanned items into witness
//! objects.

pub mod conversion;
pub mod errors;

pub use conversion::{to_observed_tx, validate_tx_id};
pub use errors::ObserverError;

/// Slots of the shared block queue when none are configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;
