//! C-chain block envelope and the atomic txs carried in `extraData`.

use serde::{Deserialize, Serialize};

use serac_core::{AssetId, BlockHeight, ChainId, TxId, UnixTime};

use super::{RawSignature, TransferableInput, TransferableOutput};

/// A decoded C-chain block: EVM envelope metadata plus the atomic txs peeled
/// from `extraData`. The EVM transaction body itself is not indexed here;
/// only the shared-memory movements are.
#[derive(Debug, Clone, PartialEq)]
pub struct CBlock {
    pub height: BlockHeight,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: UnixTime,
    pub size: u64,
    pub tx_count: u64,
    pub extra_data_hash: String,
    pub atomic_txs: Vec<CAtomicTx>,
}

/// Funds drawn from an EVM account by an atomic export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvmInput {
    pub address: String,
    pub amount: u64,
    pub asset_id: AssetId,
    pub nonce: u64,
}

/// Funds credited to an EVM account by an atomic import. Not tracked as a
/// UTXO; EVM account state is out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvmOutput {
    pub address: String,
    pub amount: u64,
    pub asset_id: AssetId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CAtomicTx {
    Export {
        tx_id: TxId,
        /// Serialized unsigned tx, the message the credentials sign
        unsigned_bytes: Vec<u8>,
        destination_chain: ChainId,
        inputs: Vec<EvmInput>,
        exported_outs: Vec<TransferableOutput>,
        credentials: Vec<RawSignature>,
    },
    Import {
        tx_id: TxId,
        unsigned_bytes: Vec<u8>,
        source_chain: ChainId,
        imported_ins: Vec<TransferableInput>,
        evm_outputs: Vec<EvmOutput>,
        credentials: Vec<RawSignature>,
    },
}

impl CAtomicTx {
    pub fn tx_id(&self) -> TxId {
        match self {
            CAtomicTx::Export { tx_id, .. } | CAtomicTx::Import { tx_id, .. } => *tx_id,
        }
    }
}
