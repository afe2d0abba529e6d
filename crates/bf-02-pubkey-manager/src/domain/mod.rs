//! Registry entries, vault key lists and errors.

pub mod entry;
pub mod errors;

pub use entry::{is_vault_memo, PubKeyEntry, VaultPubKeys};
pub use errors::PubKeyManagerError;
