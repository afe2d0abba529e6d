//! # Address Encoding
//!
//! bech32 (Cosmos-style accounts and pubkeys), segwit v0 (Bitcoin P2WPKH)
//! and Ethereum hex addresses.

use crate::{keccak256, CryptoError, Secp256k1PublicKey};
use bech32::{u5, FromBase32, ToBase32, Variant};

/// Encode raw bytes as bech32 under `hrp`.
pub fn bech32_encode(hrp: &str, data: &[u8]) -> Result<String, CryptoError> {
    Ok(bech32::encode(hrp, data.to_base32(), Variant::Bech32)?)
}

/// Decode a bech32 string into `(hrp, bytes)`. The hrp is lowercased.
pub fn bech32_decode(s: &str) -> Result<(String, Vec<u8>), CryptoError> {
    let (hrp, data, _variant) = bech32::decode(s)?;
    Ok((hrp, Vec::<u8>::from_base32(&data)?))
}

/// Encode a version-0 witness program (20 or 32 bytes) as a segwit address.
pub fn segwit_v0_encode(hrp: &str, program: &[u8]) -> Result<String, CryptoError> {
    let mut data = vec![u5::try_from_u8(0)?];
    data.extend(program.to_base32());
    Ok(bech32::encode(hrp, data, Variant::Bech32)?)
}

/// Decode a segwit v0 address and return its witness program.
pub fn segwit_v0_decode(expected_hrp: &str, address: &str) -> Result<Vec<u8>, CryptoError> {
    let (hrp, data, variant) = bech32::decode(address)?;
    if !hrp.eq_ignore_ascii_case(expected_hrp) {
        return Err(CryptoError::UnexpectedPrefix {
            expected: expected_hrp.to_string(),
            actual: hrp,
        });
    }
    let (version, program) = data
        .split_first()
        .ok_or_else(|| CryptoError::Bech32("empty witness data".to_string()))?;
    if version.to_u8() != 0 || variant != Variant::Bech32 {
        return Err(CryptoError::Bech32(format!(
            "unsupported witness version {}",
            version.to_u8()
        )));
    }
    let program = Vec::<u8>::from_base32(program)?;
    if program.len() != 20 && program.len() != 32 {
        return Err(CryptoError::Bech32(format!(
            "invalid witness program length {}",
            program.len()
        )));
    }
    Ok(program)
}

/// Lowercase `0x`-prefixed Ethereum address of a public key.
pub fn eth_address(pubkey: &Secp256k1PublicKey) -> Result<String, CryptoError> {
    let uncompressed = pubkey.to_uncompressed()?;
    let hash = keccak256(&uncompressed[1..]);
    Ok(format!("0x{}", hex::encode(&hash[12..])))
}
