//! # ECDSA Signatures (secp256k1)
//!
//! secp256k1 keys as used by the node key, local (yggdrasil) vault signing
//! and the threshold service.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalisation: `s > n/2` is replaced with `n - s`
//! - Constant-time comparison of `s` against `n/2`
//!
//! All signing here is over a 32-byte prehash: every chain computes its own
//! digest (SHA-256 sign doc, BIP-143, Keccak) before handing it over.

use crate::CryptoError;
use k256::ecdsa::{
    signature::hazmat::PrehashVerifier, RecoveryId, Signature, SigningKey, VerifyingKey,
};
use subtle::Choice;
use zeroize::Zeroize;

/// secp256k1 curve order n
/// n = 0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141
const SECP256K1_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// n/2, rounded down.
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Secp256k1PublicKey([u8; 33]);

impl Secp256k1PublicKey {
    /// Create from compressed bytes (33 bytes, starting with 0x02 or 0x03).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        let point = verifying_key.to_encoded_point(true);
        let mut out = [0u8; 33];
        if point.as_bytes().len() != 33 {
            return Err(CryptoError::InvalidPublicKey);
        }
        out.copy_from_slice(point.as_bytes());
        Ok(Self(out))
    }

    /// Get raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Uncompressed SEC1 encoding (65 bytes, leading 0x04).
    pub fn to_uncompressed(&self) -> Result<[u8; 65], CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let point = verifying_key.to_encoded_point(false);
        let mut out = [0u8; 65];
        if point.as_bytes().len() != 65 {
            return Err(CryptoError::InvalidPublicKey);
        }
        out.copy_from_slice(point.as_bytes());
        Ok(out)
    }

    /// Verify a signature over a 32-byte digest.
    pub fn verify_prehash(
        &self,
        digest: &[u8; 32],
        signature: &Secp256k1Signature,
    ) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = Signature::from_slice(&signature.0).map_err(|_| CryptoError::InvalidSignature)?;
        verifying_key
            .verify_prehash(digest, &sig)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Find the recovery id (0 or 1) that recovers this key from `signature`.
    ///
    /// Needed when the signature comes from the threshold service, which
    /// only returns `(r, s)`.
    pub fn recovery_id(&self, digest: &[u8; 32], signature: &Secp256k1Signature) -> Option<u8> {
        let sig = Signature::from_slice(&signature.0).ok()?;
        (0u8..2).find(|id| {
            RecoveryId::from_byte(*id)
                .and_then(|rid| VerifyingKey::recover_from_prehash(digest, &sig, rid).ok())
                .map(|vk| vk.to_encoded_point(true).as_bytes() == self.0.as_slice())
                .unwrap_or(false)
        })
    }
}

/// ECDSA signature (64 bytes, r||s format, low-S).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1Signature([u8; 64]);

impl Secp256k1Signature {
    /// Create from bytes (64 bytes).
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// The `r` component.
    pub fn r(&self) -> [u8; 32] {
        let mut r = [0u8; 32];
        r.copy_from_slice(&self.0[..32]);
        r
    }

    /// The `s` component.
    pub fn s(&self) -> [u8; 32] {
        let mut s = [0u8; 32];
        s.copy_from_slice(&self.0[32..]);
        s
    }

    /// DER encoding (Bitcoin witness).
    pub fn to_der(&self) -> Result<Vec<u8>, CryptoError> {
        let sig = Signature::from_slice(&self.0).map_err(|_| CryptoError::InvalidSignature)?;
        Ok(sig.to_der().as_bytes().to_vec())
    }
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Get public key (compressed, 33 bytes).
    pub fn public_key(&self) -> Secp256k1PublicKey {
        let point = self.signing_key.verifying_key().to_encoded_point(true);
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(point.as_bytes());
        Secp256k1PublicKey(bytes)
    }

    /// Sign a 32-byte digest. The result is always low-S.
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> Result<Secp256k1Signature, CryptoError> {
        self.sign_prehash_recoverable(digest).map(|(sig, _)| sig)
    }

    /// Sign a 32-byte digest and return the recovery id alongside.
    pub fn sign_prehash_recoverable(
        &self,
        digest: &[u8; 32],
    ) -> Result<(Secp256k1Signature, u8), CryptoError> {
        let (sig, recid) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let (sig, recid) = match sig.normalize_s() {
            Some(normalized) => (normalized, recid.to_byte() ^ 1),
            None => (sig, recid.to_byte()),
        };
        let bytes: [u8; 64] = sig.to_bytes().into();
        Ok((Secp256k1Signature(bytes), recid))
    }

    /// Get secret key bytes (for sealing to disk).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

/// Whether `s` is strictly greater than n/2.
///
/// Constant-time: every byte is visited regardless of where the first
/// difference is.
pub fn is_high_s(s: &[u8; 32]) -> bool {
    let mut less = Choice::from(0u8);
    let mut greater = Choice::from(0u8);

    for (s_byte, h_byte) in s.iter().zip(SECP256K1_HALF_ORDER.iter()) {
        let not_decided = !(less | greater);
        let byte_less = Choice::from((s_byte < h_byte) as u8);
        let byte_greater = Choice::from((s_byte > h_byte) as u8);

        less |= not_decided & byte_less;
        greater |= not_decided & byte_greater;
    }

    greater.into()
}

/// Replace `s` with `n - s` when `s > n/2`.
pub fn normalize_s(s: [u8; 32]) -> [u8; 32] {
    if !is_high_s(&s) {
        return s;
    }
    let mut result = [0u8; 32];
    let mut borrow: i32 = 0;

    for i in (0..32).rev() {
        let diff = (SECP256K1_ORDER[i] as i32) - (s[i] as i32) - borrow;
        if diff < 0 {
            result[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            result[i] = diff as u8;
            borrow = 0;
        }
    }

    result
}

/// Assemble a 64-byte `r || s`, left-padding each component to 32 bytes.
///
/// Leading zero bytes beyond 32 (big-integer encodings sometimes carry a
/// sign byte) are stripped first.
pub fn pad_rs(r: &[u8], s: &[u8]) -> Result<[u8; 64], CryptoError> {
    fn strip(v: &[u8]) -> &[u8] {
        let first = v.iter().position(|b| *b != 0).unwrap_or(v.len());
        &v[first..]
    }
    let (r, s) = (strip(r), strip(s));
    if r.len() > 32 || s.len() > 32 || r.is_empty() || s.is_empty() {
        return Err(CryptoError::InvalidSignature);
    }
    let mut out = [0u8; 64];
    out[32 - r.len()..32].copy_from_slice(r);
    out[64 - s.len()..].copy_from_slice(s);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(tag: u8) -> [u8; 32] {
        crate::sha256(&[tag; 16])
    }

    #[test]
    fn test_sign_verify() {
        let keypair = Secp256k1KeyPair::generate();
        let d = digest(1);
        let signature = keypair.sign_prehash(&d).unwrap();
        assert!(keypair.public_key().verify_prehash(&d, &signature).is_ok());
    }

    #[test]
    fn test_wrong_digest_fails() {
        let keypair = Secp256k1KeyPair::generate();
        let signature = keypair.sign_prehash(&digest(1)).unwrap();
        assert!(keypair
            .public_key()
            .verify_prehash(&digest(2), &signature)
            .is_err());
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = Secp256k1KeyPair::from_slice(&[0xAB; 32]).unwrap();
        let d = digest(3);
        assert_eq!(
            keypair.sign_prehash(&d).unwrap(),
            keypair.sign_prehash(&d).unwrap()
        );
    }

    #[test]
    fn test_signatures_are_low_s() {
        let keypair = Secp256k1KeyPair::generate();
        for tag in 0..16u8 {
            let sig = keypair.sign_prehash(&digest(tag)).unwrap();
            assert!(!is_high_s(&sig.s()));
        }
    }

    #[test]
    fn test_recovery_id_matches_signer() {
        let keypair = Secp256k1KeyPair::generate();
        let d = digest(9);
        let (sig, recid) = keypair.sign_prehash_recoverable(&d).unwrap();
        assert_eq!(keypair.public_key().recovery_id(&d, &sig), Some(recid));
    }

    #[test]
    fn test_normalize_s_inverts_high_values() {
        let mut high = SECP256K1_HALF_ORDER;
        high[31] += 1;
        assert!(is_high_s(&high));
        let low = normalize_s(high);
        assert!(!is_high_s(&low));
        // n - (n/2 + 1) == n/2 because n is odd
        assert_eq!(low, SECP256K1_HALF_ORDER);
    }

    #[test]
    fn test_normalize_s_keeps_half_order() {
        assert!(!is_high_s(&SECP256K1_HALF_ORDER));
        assert_eq!(normalize_s(SECP256K1_HALF_ORDER), SECP256K1_HALF_ORDER);
    }

    #[test]
    fn test_pad_rs_left_pads_short_components() {
        let out = pad_rs(&[1, 2], &[0, 0, 3]).unwrap();
        assert_eq!(out[30..32], [1, 2]);
        assert_eq!(out[63], 3);
        assert!(out[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_pad_rs_rejects_oversized() {
        assert!(pad_rs(&[1u8; 33], &[1u8; 32]).is_err());
    }

    #[test]
    fn test_uncompressed_round_trip_prefix() {
        let keypair = Secp256k1KeyPair::generate();
        let full = keypair.public_key().to_uncompressed().unwrap();
        assert_eq!(full[0], 0x04);
        let again = Secp256k1PublicKey::from_slice(&full).unwrap();
        assert_eq!(again, keypair.public_key());
    }
}
