//! Segwit v0 transactions spending P2WPKH outputs.

use shared_crypto::{double_sha256, hash160};

use crate::ChainClientError;

/// `SIGHASH_ALL`
pub const SIGHASH_ALL: u32 = 1;

const OP_0: u8 = 0x00;
const OP_RETURN: u8 = 0x6a;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;

/// Largest `OP_RETURN` payload relayed by default.
pub const MAX_OP_RETURN_LEN: usize = 80;

/// Spent output reference plus what the signer needs to know about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Funding txid in internal byte order
    pub prev_hash: [u8; 32],
    /// Output index
    pub prev_index: u32,
    /// nSequence
    pub sequence: u32,
    /// Value of the spent output in satoshis
    pub amount: u64,
}

impl TxInput {
    /// Input spending `txid:n` (display-order hex txid).
    pub fn from_txid(txid: &str, n: u32, amount: u64) -> Result<Self, ChainClientError> {
        let mut bytes = hex::decode(txid).map_err(|e| ChainClientError::decode("txid", e))?;
        if bytes.len() != 32 {
            return Err(ChainClientError::decode("txid", format!("{txid} is not 32 bytes")));
        }
        bytes.reverse();
        let mut prev_hash = [0u8; 32];
        prev_hash.copy_from_slice(&bytes);
        Ok(Self {
            prev_hash,
            prev_index: n,
            sequence: u32::MAX,
            amount,
        })
    }

    fn write_outpoint(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.prev_hash);
        buf.extend_from_slice(&self.prev_index.to_le_bytes());
    }
}

/// Value and locking script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Satoshis
    pub value: u64,
    /// scriptPubKey
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.value.to_le_bytes());
        write_var_bytes(buf, &self.script_pubkey);
    }
}

/// Transaction with per-input witness stacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegwitTx {
    /// nVersion
    pub version: i32,
    /// Inputs
    pub inputs: Vec<TxInput>,
    /// Outputs
    pub outputs: Vec<TxOutput>,
    /// nLockTime
    pub lock_time: u32,
    /// One stack per input once signed
    pub witnesses: Vec<Vec<Vec<u8>>>,
}

impl Default for SegwitTx {
    fn default() -> Self {
        Self {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
            witnesses: Vec::new(),
        }
    }
}

impl SegwitTx {
    /// BIP-143 digest for input `index` with `script_code` (length-prefixed
    /// by this function).
    pub fn sighash(&self, index: usize, script_code: &[u8], sighash_type: u32) -> [u8; 32] {
        let mut prevouts = Vec::with_capacity(36 * self.inputs.len());
        let mut sequences = Vec::with_capacity(4 * self.inputs.len());
        for input in &self.inputs {
            input.write_outpoint(&mut prevouts);
            sequences.extend_from_slice(&input.sequence.to_le_bytes());
        }
        let mut outputs = Vec::new();
        for output in &self.outputs {
            output.write(&mut outputs);
        }

        let input = &self.inputs[index];
        let mut preimage = Vec::with_capacity(160 + script_code.len());
        preimage.extend_from_slice(&self.version.to_le_bytes());
        preimage.extend_from_slice(&double_sha256(&prevouts));
        preimage.extend_from_slice(&double_sha256(&sequences));
        input.write_outpoint(&mut preimage);
        write_var_bytes(&mut preimage, script_code);
        preimage.extend_from_slice(&input.amount.to_le_bytes());
        preimage.extend_from_slice(&input.sequence.to_le_bytes());
        preimage.extend_from_slice(&double_sha256(&outputs));
        preimage.extend_from_slice(&self.lock_time.to_le_bytes());
        preimage.extend_from_slice(&sighash_type.to_le_bytes());
        double_sha256(&preimage)
    }

    fn write_base(&self, buf: &mut Vec<u8>, with_witness: bool) {
        buf.extend_from_slice(&self.version.to_le_bytes());
        if with_witness {
            buf.extend_from_slice(&[0x00, 0x01]);
        }
        write_var_int(buf, self.inputs.len() as u64);
        for input in &self.inputs {
            input.write_outpoint(buf);
            // empty scriptSig
            write_var_int(buf, 0);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_var_int(buf, self.outputs.len() as u64);
        for output in &self.outputs {
            output.write(buf);
        }
        if with_witness {
            for index in 0..self.inputs.len() {
                let stack = self.witnesses.get(index).map(Vec::as_slice).unwrap_or(&[]);
                write_var_int(buf, stack.len() as u64);
                for item in stack {
                    write_var_bytes(buf, item);
                }
            }
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
    }

    fn has_witness(&self) -> bool {
        self.witnesses.iter().any(|w| !w.is_empty())
    }

    /// Network serialisation, with witness data when any input is signed.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_base(&mut buf, self.has_witness());
        buf
    }

    /// Display-order txid (hash of the witness-stripped serialisation).
    pub fn txid(&self) -> String {
        let mut buf = Vec::new();
        self.write_base(&mut buf, false);
        let mut hash = double_sha256(&buf);
        hash.reverse();
        hex::encode(hash)
    }

    /// Virtual size in vbytes.
    pub fn vsize(&self) -> u64 {
        let mut stripped = Vec::new();
        self.write_base(&mut stripped, false);
        let total = if self.has_witness() {
            self.serialize().len()
        } else {
            stripped.len()
        };
        let weight = stripped.len() * 3 + total;
        weight.div_ceil(4) as u64
    }

    /// Virtual size once every input carries a P2WPKH witness.
    pub fn estimated_vsize(&self) -> u64 {
        let mut sized = self.clone();
        // 72-byte DER signature with sighash byte, 33-byte pubkey
        sized.witnesses = vec![vec![vec![0u8; 73], vec![0u8; 33]]; self.inputs.len()];
        sized.vsize()
    }
}

/// `OP_0 <program>`
pub fn witness_v0_script(program: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(2 + program.len());
    script.push(OP_0);
    script.push(program.len() as u8);
    script.extend_from_slice(program);
    script
}

/// P2WPKH script of a compressed pubkey.
pub fn p2wpkh_script(pubkey: &[u8; 33]) -> Vec<u8> {
    witness_v0_script(&hash160(pubkey))
}

/// BIP-143 scriptCode of a P2WPKH output (P2PKH form, without length).
pub fn p2wpkh_script_code(pubkey: &[u8; 33]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
    script.extend_from_slice(&hash160(pubkey));
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// `OP_RETURN <data>`
pub fn op_return_script(data: &[u8]) -> Result<Vec<u8>, ChainClientError> {
    if data.len() > MAX_OP_RETURN_LEN {
        return Err(ChainClientError::InvalidInstruction(format!(
            "memo of {} bytes exceeds {MAX_OP_RETURN_LEN}",
            data.len()
        )));
    }
    let mut script = Vec::with_capacity(3 + data.len());
    script.push(OP_RETURN);
    if data.len() >= usize::from(OP_PUSHDATA1) {
        script.push(OP_PUSHDATA1);
    }
    script.push(data.len() as u8);
    script.extend_from_slice(data);
    Ok(script)
}

fn write_var_int(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_var_int(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}
