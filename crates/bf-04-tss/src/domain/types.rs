//! Threshold service request and response bodies.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use shared_crypto::{normalize_s, pad_rs};
use shared_types::{Blame, PubKey};

use crate::TssError;

/// Outcome of a round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TssStatus {
    /// Round completed
    #[default]
    Success,
    /// Round failed; see blame
    Fail,
    /// This node was not selected for the round
    NotApplicable,
}

impl TryFrom<u8> for TssStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TssStatus::Success),
            1 => Ok(TssStatus::Fail),
            2 => Ok(TssStatus::NotApplicable),
            other => Err(format!("unknown TSS status {other}")),
        }
    }
}

impl From<TssStatus> for u8 {
    fn from(status: TssStatus) -> Self {
        match status {
            TssStatus::Success => 0,
            TssStatus::Fail => 1,
            TssStatus::NotApplicable => 2,
        }
    }
}

/// `POST /keysign`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysignRequest {
    /// Vault whose shares sign
    pub pool_pub_key: PubKey,
    /// base64 of the 32-byte digest
    pub message: String,
    /// Committee chosen by consensus
    pub signer_pub_keys: Vec<PubKey>,
}

impl KeysignRequest {
    /// Request for `digest` signed by `pool_pub_key`'s committee.
    pub fn new(pool_pub_key: PubKey, digest: &[u8], signer_pub_keys: Vec<PubKey>) -> Self {
        Self {
            pool_pub_key,
            message: BASE64.encode(digest),
            signer_pub_keys,
        }
    }
}

/// Keysign reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysignResponse {
    /// base64 big-endian `r`
    #[serde(default)]
    pub r: String,
    /// base64 big-endian `s`
    #[serde(default)]
    pub s: String,
    /// Outcome
    #[serde(default)]
    pub status: TssStatus,
    /// Culprits when `status` is fail
    #[serde(default)]
    pub blame: Blame,
}

impl KeysignResponse {
    /// Signature, `None` when this node sat the round out.
    pub fn into_signature(self) -> Result<Option<[u8; 64]>, TssError> {
        match self.status {
            TssStatus::NotApplicable => Ok(None),
            TssStatus::Fail => Err(failure(self.blame)),
            TssStatus::Success => {
                let r = BASE64
                    .decode(self.r.as_bytes())
                    .map_err(|e| TssError::Decode(format!("r: {e}")))?;
                let s = BASE64
                    .decode(self.s.as_bytes())
                    .map_err(|e| TssError::Decode(format!("s: {e}")))?;
                Ok(Some(assemble_signature(&r, &s)?))
            }
        }
    }
}

/// `POST /keygen`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeygenRequest {
    /// Members of the new vault
    pub keys: Vec<PubKey>,
}

/// Keygen reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeygenResponse {
    /// New vault key
    #[serde(default)]
    pub pub_key: PubKey,
    /// Outcome
    #[serde(default)]
    pub status: TssStatus,
    /// Culprits when `status` is fail
    #[serde(default)]
    pub blame: Blame,
}

impl KeygenResponse {
    /// New vault key, `None` when this node was not a member.
    pub fn into_pubkey(self) -> Result<Option<PubKey>, TssError> {
        match self.status {
            TssStatus::NotApplicable => Ok(None),
            TssStatus::Fail => Err(failure(self.blame)),
            TssStatus::Success if self.pub_key.is_empty() => {
                Err(TssError::Decode("keygen returned an empty pubkey".to_string()))
            }
            TssStatus::Success => Ok(Some(self.pub_key)),
        }
    }
}

fn failure(blame: Blame) -> TssError {
    if blame.fail_reason.contains("BROKEN SIGNATURE") {
        return TssError::BrokenSignature;
    }
    if blame.is_empty() {
        return TssError::Failed(blame.fail_reason);
    }
    TssError::Blame(blame)
}

/// 64-byte `r || s`, each left-padded, with `s` forced low.
pub fn assemble_signature(r: &[u8], s: &[u8]) -> Result<[u8; 64], TssError> {
    let mut signature = pad_rs(r, s)?;
    let mut high = [0u8; 32];
    high.copy_from_slice(&signature[32..]);
    signature[32..].copy_from_slice(&normalize_s(high));
    Ok(signature)
}
