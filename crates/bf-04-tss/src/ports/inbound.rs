//! Driving Ports (API offered to chain adapters and the keygen coordinator)

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Blame, ChainNetwork, PubKey};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::TssError;

/// Threshold signing and key generation.
#[async_trait]
pub trait ThresholdSigner: Send + Sync {
    /// Sign a 32-byte digest with `pool_pub_key`'s shares held by
    /// `signers`. `Ok(None)` means this node was not in the committee.
    async fn keysign(
        &self,
        digest: &[u8],
        pool_pub_key: &PubKey,
        signers: &[PubKey],
    ) -> Result<Option<[u8; 64]>, TssError>;

    /// Generate a vault shared by `members`. `Ok(None)` means this node
    /// does not take part.
    async fn keygen(&self, members: &[PubKey]) -> Result<Option<PubKey>, TssError>;

    /// Peer id of the local service.
    async fn p2p_id(&self) -> Result<String, TssError>;
}

/// In-process threshold service for tests.
///
/// Every vault it generates is backed by a real key, so the signatures it
/// returns verify against the vault pubkey. Scripted outcomes are consumed
/// before real signing.
pub struct MockTssServer {
    network: ChainNetwork,
    vaults: RwLock<HashMap<PubKey, Arc<Secp256k1KeyPair>>>,
    keysign_script: Mutex<VecDeque<Result<Option<[u8; 64]>, TssError>>>,
    keygen_blame: Mutex<Option<Blame>>,
    not_selected: AtomicBool,
    keysign_calls: AtomicUsize,
    keygen_calls: RwLock<Vec<Vec<PubKey>>>,
}

impl MockTssServer {
    /// Empty service deriving vault pubkeys for `network`.
    pub fn new(network: ChainNetwork) -> Self {
        Self {
            network,
            vaults: RwLock::new(HashMap::new()),
            keysign_script: Mutex::new(VecDeque::new()),
            keygen_blame: Mutex::new(None),
            not_selected: AtomicBool::new(false),
            keysign_calls: AtomicUsize::new(0),
            keygen_calls: RwLock::new(Vec::new()),
        }
    }

    /// Create a vault directly, returning its pubkey.
    pub fn add_vault(&self) -> Result<PubKey, TssError> {
        let pair = Secp256k1KeyPair::generate();
        let pk = PubKey::from_secp256k1(&pair.public_key(), self.network)
            .map_err(|e| TssError::Decode(e.to_string()))?;
        self.vaults.write().insert(pk.clone(), Arc::new(pair));
        Ok(pk)
    }

    /// Key pair backing `pk`.
    pub fn vault_key(&self, pk: &PubKey) -> Option<Arc<Secp256k1KeyPair>> {
        self.vaults.read().get(pk).cloned()
    }

    /// Fail the next keysign with `blame`.
    pub fn push_keysign_blame(&self, blame: Blame) {
        self.keysign_script.lock().push_back(Err(TssError::Blame(blame)));
    }

    /// Fail the next keysign with `err`.
    pub fn push_keysign_error(&self, err: TssError) {
        self.keysign_script.lock().push_back(Err(err));
    }

    /// Fail the next keygen with `blame`.
    pub fn set_keygen_blame(&self, blame: Option<Blame>) {
        *self.keygen_blame.lock() = blame;
    }

    /// Report every round as "not selected".
    pub fn set_not_selected(&self, value: bool) {
        self.not_selected.store(value, Ordering::SeqCst);
    }

    /// Keysign requests served.
    pub fn keysign_calls(&self) -> usize {
        self.keysign_calls.load(Ordering::SeqCst)
    }

    /// Member lists of every keygen request.
    pub fn keygen_calls(&self) -> Vec<Vec<PubKey>> {
        self.keygen_calls.read().clone()
    }
}

#[async_trait]
impl ThresholdSigner for MockTssServer {
    async fn keysign(
        &self,
        digest: &[u8],
        pool_pub_key: &PubKey,
        _signers: &[PubKey],
    ) -> Result<Option<[u8; 64]>, TssError> {
        self.keysign_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.keysign_script.lock().pop_front() {
            return scripted;
        }
        if self.not_selected.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let digest: [u8; 32] = digest
            .try_into()
            .map_err(|_| TssError::InvalidMessage(digest.len()))?;
        let pair = self
            .vault_key(pool_pub_key)
            .ok_or_else(|| TssError::Failed(format!("unknown vault {pool_pub_key}")))?;
        let signature = pair.sign_prehash(&digest)?;
        Ok(Some(*signature.as_bytes()))
    }

    async fn keygen(&self, members: &[PubKey]) -> Result<Option<PubKey>, TssError> {
        self.keygen_calls.write().push(members.to_vec());
        if let Some(blame) = self.keygen_blame.lock().clone() {
            return Err(TssError::Blame(blame));
        }
        if self.not_selected.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.add_vault().map(Some)
    }

    async fn p2p_id(&self) -> Result<String, TssError> {
        Ok("16Uiu2HAmMockTssServer".to_string())
    }
}
