//! EIP-155 legacy transactions.

use primitive_types::{H160, U256};
use rlp::RlpStream;
use shared_crypto::keccak256;

use crate::ChainClientError;

/// Wei per 1e8 unit of ETH.
pub const WEI_PER_E8: u64 = 10_000_000_000;

/// Unsigned legacy transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTx {
    /// Sender nonce
    pub nonce: u64,
    /// Wei per gas
    pub gas_price: U256,
    /// Gas units
    pub gas_limit: u64,
    /// Recipient
    pub to: H160,
    /// Wei sent
    pub value: U256,
    /// Calldata (the memo)
    pub data: Vec<u8>,
}

impl LegacyTx {
    fn append_body(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        stream.append(&self.to);
        stream.append(&self.value);
        stream.append(&self.data);
    }

    /// Keccak digest signed under replay protection for `chain_id`.
    pub fn sighash(&self, chain_id: u64) -> [u8; 32] {
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
        keccak256(&stream.out())
    }

    /// Signed RLP with `v = recovery_id + 2 * chain_id + 35`.
    pub fn encode_signed(&self, chain_id: u64, signature: &[u8; 64], recovery_id: u8) -> Vec<u8> {
        let v = u64::from(recovery_id) + chain_id * 2 + 35;
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&v);
        stream.append(&U256::from_big_endian(&signature[..32]));
        stream.append(&U256::from_big_endian(&signature[32..]));
        stream.out().to_vec()
    }
}

/// `0x`-prefixed 20-byte address.
pub fn parse_address(text: &str) -> Result<H160, ChainClientError> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    let bytes = hex::decode(digits)
        .map_err(|e| ChainClientError::InvalidInstruction(format!("to address {text}: {e}")))?;
    if bytes.len() != 20 {
        return Err(ChainClientError::InvalidInstruction(format!(
            "to address {text} is not 20 bytes"
        )));
    }
    Ok(H160::from_slice(&bytes))
}

/// Wei to 1e8 units, saturating.
pub fn wei_to_e8(wei: U256) -> u64 {
    let units = wei / U256::from(WEI_PER_E8);
    if units > U256::from(u64::MAX) {
        return u64::MAX;
    }
    units.low_u64()
}

/// 1e8 units to wei.
pub fn e8_to_wei(amount: u64) -> U256 {
    U256::from(amount) * U256::from(WEI_PER_E8)
}
