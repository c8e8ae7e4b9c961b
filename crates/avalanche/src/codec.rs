//! Block-store payload codecs.
//!
//! Layouts here are stable storage formats: a node can re-decode every
//! payload it ever wrote. Any parse failure is a data-integrity error; the
//! indexing path never skips a block it cannot read.
//!
//! P-chain payload frame:
//! `[u32 BE block-len][block bytes][u16 BE reward count]{[u16 BE len][utxo bytes]}*`

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::{
    model::{CAtomicTx, CBlock, PBlock, PackedUtxo, XBlock, XTxRecord},
    ChainError,
};

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Encode a P-chain block with its packed reward UTXOs.
pub fn encode_p_payload(block: &PBlock) -> Result<Vec<u8>, ChainError> {
    let block_bytes = serde_json::to_vec(block).map_err(ChainError::decoding)?;

    if block.reward_utxos.len() > u16::MAX as usize {
        return Err(ChainError::Decoding("reward set count exceeds u16".into()));
    }

    let mut buf = Vec::with_capacity(block_bytes.len() + 64);
    buf.extend_from_slice(&(block_bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(&block_bytes);
    buf.extend_from_slice(&(block.reward_utxos.len() as u16).to_be_bytes());

    for utxo in &block.reward_utxos {
        let bytes = bincode::serialize(utxo).map_err(ChainError::decoding)?;
        if bytes.len() > u16::MAX as usize {
            return Err(ChainError::Decoding("reward utxo exceeds u16 length".into()));
        }
        buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        buf.extend_from_slice(&bytes);
    }

    Ok(buf)
}

pub fn decode_p_payload(raw: &[u8]) -> Result<PBlock, ChainError> {
    let mut cursor = Cursor::new(raw);

    let block_len = cursor.take_u32()? as usize;
    let block_bytes = cursor.take(block_len)?;
    let mut block: PBlock = serde_json::from_slice(block_bytes).map_err(ChainError::decoding)?;

    let count = cursor.take_u16()?;
    let mut rewards = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let len = cursor.take_u16()? as usize;
        let bytes = cursor.take(len)?;
        let utxo: PackedUtxo = bincode::deserialize(bytes).map_err(ChainError::decoding)?;
        rewards.push(utxo);
    }

    cursor.expect_empty()?;

    block.reward_utxos = rewards;
    Ok(block)
}

pub fn encode_x_block(block: &XBlock) -> Result<Vec<u8>, ChainError> {
    serde_json::to_vec(block).map_err(ChainError::decoding)
}

pub fn decode_x_block(raw: &[u8]) -> Result<XBlock, ChainError> {
    serde_json::from_slice(raw).map_err(ChainError::decoding)
}

pub fn encode_x_tx(record: &XTxRecord) -> Result<Vec<u8>, ChainError> {
    serde_json::to_vec(record).map_err(ChainError::decoding)
}

pub fn decode_x_tx(raw: &[u8]) -> Result<XTxRecord, ChainError> {
    serde_json::from_slice(raw).map_err(ChainError::decoding)
}

/// The C-chain payload is a JSON envelope; `extraData` carries the atomic
/// txs, base64-wrapped, framed by the ApricotPhase5 boundary: a single tx
/// before, a slice after.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CEnvelope {
    hash: String,
    parent_hash: String,
    number: u64,
    timestamp: u64,
    size: u64,
    tx_count: u64,
    extra_data: String,
    extra_data_hash: String,
}

pub fn encode_c_payload(block: &CBlock, ap5_active: bool) -> Result<Vec<u8>, ChainError> {
    let atomic_json = if ap5_active {
        serde_json::to_vec(&block.atomic_txs).map_err(ChainError::decoding)?
    } else {
        match block.atomic_txs.as_slice() {
            [] => Vec::new(),
            [single] => serde_json::to_vec(single).map_err(ChainError::decoding)?,
            _ => {
                return Err(ChainError::AtomicDecoding(
                    "multiple atomic txs before ApricotPhase5".into(),
                ))
            }
        }
    };

    let envelope = CEnvelope {
        hash: block.hash.clone(),
        parent_hash: block.parent_hash.clone(),
        number: block.height,
        timestamp: block.timestamp,
        size: block.size,
        tx_count: block.tx_count,
        extra_data: B64.encode(&atomic_json),
        extra_data_hash: block.extra_data_hash.clone(),
    };

    serde_json::to_vec(&envelope).map_err(ChainError::decoding)
}

pub fn decode_c_payload(raw: &[u8], ap5_active: bool) -> Result<CBlock, ChainError> {
    let envelope: CEnvelope = serde_json::from_slice(raw).map_err(ChainError::decoding)?;

    let atomic_json = B64
        .decode(&envelope.extra_data)
        .map_err(|e| ChainError::AtomicDecoding(e.to_string()))?;

    let atomic_txs = if atomic_json.is_empty() {
        Vec::new()
    } else if ap5_active {
        serde_json::from_slice::<Vec<CAtomicTx>>(&atomic_json)
            .map_err(|e| ChainError::AtomicDecoding(e.to_string()))?
    } else {
        let single = serde_json::from_slice::<CAtomicTx>(&atomic_json)
            .map_err(|e| ChainError::AtomicDecoding(e.to_string()))?;
        vec![single]
    };

    Ok(CBlock {
        height: envelope.number,
        hash: envelope.hash,
        parent_hash: envelope.parent_hash,
        timestamp: envelope.timestamp,
        size: envelope.size,
        tx_count: envelope.tx_count,
        extra_data_hash: envelope.extra_data_hash,
        atomic_txs,
    })
}

struct Cursor<'a> {
    raw: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(raw: &'a [u8]) -> Self {
        Self { raw, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ChainError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.raw.len())
            .ok_or_else(|| ChainError::Decoding("payload frame truncated".into()))?;

        let slice = &self.raw[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u32(&mut self) -> Result<u32, ChainError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take_u16(&mut self) -> Result<u16, ChainError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn expect_empty(&self) -> Result<(), ChainError> {
        if self.pos != self.raw.len() {
            return Err(ChainError::Decoding("trailing bytes after frame".into()));
        }
        Ok(())
    }
}
