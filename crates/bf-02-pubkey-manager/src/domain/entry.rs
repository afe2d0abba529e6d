//! Registry entries.

use shared_types::{PubKey, PubKeys, MEMO_MIGRATE, MEMO_YGGDRASIL_FUND, MEMO_YGGDRASIL_RETURN};

/// One registered key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubKeyEntry {
    /// The key
    pub pubkey: PubKey,
    /// This node holds a share of it
    pub signer: bool,
    /// This is the node's own key
    pub node_account: bool,
}

impl PubKeyEntry {
    /// Plain entry with no flags.
    pub fn new(pubkey: PubKey, signer: bool) -> Self {
        Self {
            pubkey,
            signer,
            node_account: false,
        }
    }
}

/// Vault keys reported by the consensus layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultPubKeys {
    /// Shared (threshold) vaults
    pub asgard: PubKeys,
    /// Per-node vaults
    pub yggdrasil: PubKeys,
}

impl VaultPubKeys {
    /// Asgard keys followed by yggdrasil keys.
    pub fn all(&self) -> impl Iterator<Item = &PubKey> {
        self.asgard.iter().chain(self.yggdrasil.iter())
    }
}

/// Memos that move funds between vaults.
///
/// A transfer carrying one of these to an unknown address may target a
/// vault the registry has not fetched yet.
pub fn is_vault_memo(memo: &str) -> bool {
    let memo = memo.trim().to_ascii_lowercase();
    memo == MEMO_MIGRATE || memo == MEMO_YGGDRASIL_FUND || memo == MEMO_YGGDRASIL_RETURN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_memo_is_case_insensitive() {
        assert!(is_vault_memo("MIGRATE"));
        assert!(is_vault_memo("yggdrasil+"));
        assert!(is_vault_memo("Yggdrasil-"));
        assert!(!is_vault_memo("outbound:ABC"));
        assert!(!is_vault_memo("SWAP:BNB.BNB"));
    }

    #[test]
    fn test_vault_keys_order() {
        let keys = VaultPubKeys {
            asgard: vec![PubKey::new_unchecked("a")],
            yggdrasil: vec![PubKey::new_unchecked("y")],
        };
        let all: Vec<_> = keys.all().map(|k| k.as_str()).collect();
        assert_eq!(all, vec!["a", "y"]);
    }
}
