//! Scanned item → witness object.

use bf_03_thorchain_bridge::ObservedTx;
use shared_types::{Chain, TxInItem};

use crate::ObserverError;

/// Accept a 32-byte hash in hex, with or without a `0x` prefix.
pub fn validate_tx_id(id: &str) -> Result<(), ObserverError> {
    let hex = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .unwrap_or(id);
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ObserverError::InvalidTxHash(id.to_string()));
    }
    Ok(())
}

/// Witness object for `item` seen on `chain`.
pub fn to_observed_tx(chain: &Chain, item: &TxInItem) -> Result<ObservedTx, ObserverError> {
    validate_tx_id(&item.tx)?;
    if item.sender.is_empty() {
        return Err(ObserverError::InvalidAddress {
            tx: item.tx.clone(),
            field: "sender",
        });
    }
    if item.to.is_empty() {
        return Err(ObserverError::InvalidAddress {
            tx: item.tx.clone(),
            field: "to",
        });
    }
    if item.block_height <= 0 {
        return Err(ObserverError::InvalidHeight(item.block_height));
    }
    if item.observed_vault_pubkey.is_empty() {
        return Err(ObserverError::MissingVault(item.tx.clone()));
    }
    Ok(ObservedTx::from_item(chain, item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Address, PubKey};

    fn item() -> TxInItem {
        TxInItem {
            block_height: 12,
            tx: "AB".repeat(32),
            sender: Address::new("tbnb1sender"),
            to: Address::new("tbnb1vault"),
            memo: "SWAP:BNB.BNB".to_string(),
            observed_vault_pubkey: PubKey::new_unchecked("tthorpub1vault"),
            ..Default::default()
        }
    }

    #[test]
    fn test_tx_id_forms() {
        assert!(validate_tx_id(&"ab".repeat(32)).is_ok());
        assert!(validate_tx_id(&format!("0x{}", "0f".repeat(32))).is_ok());
        assert!(validate_tx_id("").is_err());
        assert!(validate_tx_id(&"a".repeat(63)).is_err());
        assert!(validate_tx_id(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_converts_valid_item() {
        let observed = to_observed_tx(&Chain::bnb(), &item()).unwrap();
        assert_eq!(observed.tx.id, "AB".repeat(32));
        assert_eq!(observed.tx.chain, Chain::bnb());
        assert_eq!(observed.tx.memo, "SWAP:BNB.BNB");
        assert_eq!(observed.block_height, 12);
        assert_eq!(observed.observed_pub_key.as_str(), "tthorpub1vault");
    }

    #[test]
    fn test_rejects_invalid_items() {
        let mut bad = item();
        bad.sender = Address::default();
        assert!(matches!(
            to_observed_tx(&Chain::bnb(), &bad),
            Err(ObserverError::InvalidAddress { field: "sender", .. })
        ));

        let mut bad = item();
        bad.block_height = 0;
        assert!(matches!(
            to_observed_tx(&Chain::bnb(), &bad),
            Err(ObserverError::InvalidHeight(0))
        ));

        let mut bad = item();
        bad.tx = "nothex".to_string();
        assert!(matches!(
            to_observed_tx(&Chain::bnb(), &bad),
            Err(ObserverError::InvalidTxHash(_))
        ));

        let mut bad = item();
        bad.observed_vault_pubkey = PubKey::default();
        assert!(matches!(
            to_observed_tx(&Chain::bnb(), &bad),
            Err(ObserverError::MissingVault(_))
        ));
    }
}
