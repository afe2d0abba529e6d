//! # Symmetric Sealing
//!
//! AES-256-GCM with a random 96-bit nonce. A sealed payload is
//! `nonce (12 bytes) || ciphertext+tag`.
//!
//! Used for the node key file and for signing-store records when the
//! operator supplies a passphrase.

use crate::{sha256, CryptoError};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use zeroize::Zeroize;

/// Length of the nonce prefix.
pub const NONCE_LEN: usize = 12;

/// Secret key (256-bit).
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive from an operator passphrase (SHA-256).
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self(sha256(passphrase.as_bytes()))
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Encrypt `plaintext`, returning `nonce || ciphertext`.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if encryption fails.
pub fn seal(key: &SecretKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let mut nonce = [0u8; NONCE_LEN];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a payload produced by [`seal`].
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` on a wrong key or tampering.
pub fn open(key: &SecretKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_LEN {
        return Err(CryptoError::SealedTooShort(sealed.len()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = SecretKey::from_passphrase("hunter2");
        let sealed = seal(&key, b"txout record").unwrap();
        assert_eq!(open(&key, &sealed).unwrap(), b"txout record");
    }

    #[test]
    fn test_nonce_is_prefixed() {
        let key = SecretKey::from_passphrase("p");
        let sealed = seal(&key, b"").unwrap();
        // empty plaintext still carries nonce and 16-byte tag
        assert_eq!(sealed.len(), NONCE_LEN + 16);
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let sealed = seal(&SecretKey::from_passphrase("a"), b"secret").unwrap();
        assert!(open(&SecretKey::from_passphrase("b"), &sealed).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = SecretKey::from_passphrase("a");
        let mut sealed = seal(&key, b"secret").unwrap();
        sealed[NONCE_LEN] ^= 0xFF;
        assert!(open(&key, &sealed).is_err());
    }

    #[test]
    fn test_short_payload_rejected() {
        let err = open(&SecretKey::from_passphrase("a"), &[1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }
}
