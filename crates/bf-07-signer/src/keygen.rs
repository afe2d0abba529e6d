//! # Keygen Coordinator
//!
//! Runs the distributed key generation rounds the consensus layer assigns
//! to this node and reports each result with a `tss_pool` message.

use bf_02_pubkey_manager::PubKeyValidator;
use bf_03_thorchain_bridge::ThorchainBridge;
use bf_04_tss::{ThresholdSigner, TssError};
use bifrost_telemetry::{names, Metrics};
use shared_types::{Blame, Chain, Keygen, KeygenBlock, PubKey};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::SignerError;

/// Drives keygen rounds and registers the vaults they produce.
pub struct KeygenCoordinator {
    bridge: Arc<dyn ThorchainBridge>,
    registry: Arc<dyn PubKeyValidator>,
    tss: Arc<dyn ThresholdSigner>,
    metrics: Arc<Metrics>,
    chains: Vec<Chain>,
}

impl KeygenCoordinator {
    /// Coordinator reporting `chains` as the chains new vaults serve.
    pub fn new(
        bridge: Arc<dyn ThorchainBridge>,
        registry: Arc<dyn PubKeyValidator>,
        tss: Arc<dyn ThresholdSigner>,
        metrics: Arc<Metrics>,
        chains: Vec<Chain>,
    ) -> Self {
        Self {
            bridge,
            registry,
            tss,
            metrics,
            chains,
        }
    }

    /// Run every assignment of `block`. Failures are counted and logged; the
    /// assignment is rediscovered when consensus replays it.
    pub async fn process_keygen_block(&self, block: &KeygenBlock) {
        for keygen in &block.keygens {
            if let Err(e) = self.process_keygen(block.height, keygen).await {
                error!(height = block.height, error = %e, "[bf-07] Failed to process keygen");
            }
        }
    }

    /// One keygen round. Returns the new vault key, or `None` when this node
    /// took no part or the round ended in blame.
    pub async fn process_keygen(
        &self,
        height: i64,
        keygen: &Keygen,
    ) -> Result<Option<PubKey>, SignerError> {
        for member in &keygen.members {
            self.registry.add_pubkey(member.clone(), false);
        }

        let (pool_pk, blame) = match self.tss.keygen(&keygen.members).await {
            Ok(Some(pk)) => {
                self.registry.add_pubkey(pk.clone(), true);
                info!(height, pubkey = %pk, "[bf-07] Generated new vault");
                (pk, Blame::default())
            }
            Ok(None) => {
                debug!(height, "[bf-07] Not part of this keygen");
                return Ok(None);
            }
            Err(TssError::Blame(blame)) if !blame.is_empty() => {
                warn!(height, blame = %blame, "[bf-07] Keygen failed with blame");
                (PubKey::default(), blame)
            }
            Err(e) => {
                self.metrics.inc_error(
                    names::SIGNER_ERROR,
                    "fail_to_keygen_pubkey",
                    &height.to_string(),
                );
                return Err(e.into());
            }
        };

        let tx = self.bridge.get_keygen_std_tx(
            pool_pk.clone(),
            blame,
            keygen.members.clone(),
            keygen.keygen_type,
            self.chains.clone(),
            height,
        );
        if let Err(e) = self.bridge.broadcast(tx).await {
            self.metrics.inc_error(
                names::SIGNER_ERROR,
                "fail_to_broadcast_keygen",
                &height.to_string(),
            );
            return Err(e.into());
        }
        Ok((!pool_pk.is_empty()).then_some(pool_pk))
    }
}
