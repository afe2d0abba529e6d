//! # Shared Crypto
//!
//! Cryptographic primitives used across Bifrost.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecdsa` | secp256k1 | Node key, local vault signing, low-S normalisation |
//! | `hashing` | SHA-256, RIPEMD-160, Keccak-256 | Digests and address hashes |
//! | `encoding` | bech32, segwit v0, hex | Chain address derivation |
//! | `symmetric` | AES-256-GCM | At-rest sealing of key files and stores |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, signatures always low-S
//! - **AES-GCM**: random 96-bit nonce, prefixed to the ciphertext

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod encoding;
pub mod errors;
pub mod hashing;
pub mod symmetric;

// Re-exports
pub use ecdsa::{
    is_high_s, normalize_s, pad_rs, Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature,
};
pub use encoding::{bech32_decode, bech32_encode, eth_address, segwit_v0_decode, segwit_v0_encode};
pub use errors::CryptoError;
pub use hashing::{double_sha256, hash160, keccak256, sha256};
pub use symmetric::{open, seal, SecretKey, NONCE_LEN};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
