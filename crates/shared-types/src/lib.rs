//! # Shared Types Crate
//!
//! Domain vocabulary used by every Bifrost subsystem.
//!
//! ## Design Principles
//!
//! - **Case at the boundary**: chain tags and addresses are compared
//!   case-insensitively where they enter the system and stored in one
//!   canonical case afterwards.
//! - **Amounts are unsigned**: every `Coin` amount is a `u64`; subtraction
//!   saturates at zero.
//! - **Wire tolerant**: heights and amounts accept both JSON numbers and
//!   decimal strings, because the consensus REST codec emits strings.
//!
//! ## Module Structure
//!
//! ```text
//! shared-types/
//! ├── chain.rs     # Chain tag, ChainNetwork (NET)
//! ├── pubkey.rs    # Vault public key, per-chain address derivation
//! ├── address.rs   # External chain address
//! ├── coin.rs      # Asset, Coin, Coins
//! ├── gas.rs       # Per-chain fee rules
//! ├── tx.rs        # TxIn/TxInItem, TxOut/TxOutItem, keygen instructions
//! ├── blame.rs     # Threshold-round blame
//! └── errors.rs
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod blame;
pub mod chain;
pub mod coin;
pub mod errors;
pub mod gas;
pub mod pubkey;
pub mod tx;

pub use address::Address;
pub use blame::{Blame, BlameNode};
pub use chain::{Chain, ChainNetwork};
pub use coin::{Asset, Coin, Coins, Gas};
pub use errors::TypesError;
pub use pubkey::{PubKey, PubKeys};
pub use tx::{Keygen, KeygenBlock, KeygenType, TxIn, TxInItem, TxOut, TxOutItem};

/// Memo that asks a yggdrasil vault to return everything it holds.
pub const MEMO_YGGDRASIL_RETURN: &str = "yggdrasil-";

/// Memo prefix for funding a yggdrasil vault.
pub const MEMO_YGGDRASIL_FUND: &str = "yggdrasil+";

/// Memo prefix for vault-to-vault migrations.
pub const MEMO_MIGRATE: &str = "migrate";

/// Memo prefix for outbound payments.
pub const MEMO_OUTBOUND: &str = "outbound";

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
