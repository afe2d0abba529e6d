//! Driving Ports (API offered to observers, signers and chain adapters)

use async_trait::async_trait;
use shared_types::{Address, Chain, PubKey, PubKeys, TxInItem};

/// Vault key registry.
///
/// Reads and writes are independently lockable; no method blocks on I/O
/// except [`PubKeyValidator::fetch_pubkeys`].
#[async_trait]
pub trait PubKeyValidator: Send + Sync {
    /// Register `pk`. `signer = true` upgrades an existing entry; `false`
    /// never downgrades one.
    fn add_pubkey(&self, pk: PubKey, signer: bool);

    /// Register the node's own key (always a signer).
    fn add_node_pubkey(&self, pk: PubKey);

    /// Forget `pk`.
    fn remove_pubkey(&self, pk: &PubKey);

    /// Whether `pk` is registered.
    fn has_pubkey(&self, pk: &PubKey) -> bool;

    /// Every registered key.
    fn get_pubkeys(&self) -> PubKeys;

    /// Keys this node signs for.
    fn get_signers(&self) -> PubKeys;

    /// The node's own key, if registered.
    fn get_node_pubkey(&self) -> Option<PubKey>;

    /// The vault key whose `chain` address equals `addr`.
    fn is_valid_vault_address(&self, addr: &Address, chain: &Chain) -> Option<PubKey>;

    /// Whether `tx` moves funds into or out of a registered vault.
    fn matched_address(&self, chain: &Chain, tx: &TxInItem) -> bool {
        self.is_valid_vault_address(&tx.sender, chain).is_some()
            || self.is_valid_vault_address(&tx.to, chain).is_some()
    }

    /// Pull the vault key list from consensus now. Failures are logged and
    /// counted, never returned.
    async fn fetch_pubkeys(&self);
}
