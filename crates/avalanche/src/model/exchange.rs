//! X-chain blocks and transactions, covering both the linear-block era and
//! the pre-Cortina sequential tx log.

use serde::{Deserialize, Serialize};

use serac_core::{BlockHeight, ChainId, Id32, TxId, TxIndex, UnixTime};

use super::{Output, TransferableInput, TransferableOutput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XBlock {
    pub height: BlockHeight,
    pub timestamp: UnixTime,
    pub block_id: Id32,
    pub txs: Vec<XTransaction>,
}

/// A pre-Cortina tx as stored in the sequential tx log. These carry no
/// usable timestamp: the node's acceptance time reflects this node only, so
/// the real network time comes from the timestamp archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XTxRecord {
    pub index: TxIndex,
    pub tx: XTransaction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XBaseFields {
    pub tx_id: TxId,
    pub outs: Vec<TransferableOutput>,
    pub ins: Vec<TransferableInput>,
    pub memo: Vec<u8>,
}

/// Outputs minted for the asset created by a `CreateAsset` tx. They follow
/// the base outs in the output index sequence, state by state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    pub fx_id: Option<Id32>,
    pub outs: Vec<Output>,
}

/// One operation of an `Operation` tx: consumes the referenced UTXOs and
/// mints `outs` for the asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOp {
    pub asset_id: Id32,
    pub utxo_refs: Vec<(TxId, u32)>,
    pub outs: Vec<Output>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum XTransaction {
    Base {
        base: XBaseFields,
    },
    CreateAsset {
        base: XBaseFields,
        name: String,
        symbol: String,
        denomination: u8,
        states: Vec<InitialState>,
    },
    Operation {
        base: XBaseFields,
        ops: Vec<TransferOp>,
    },
    Import {
        base: XBaseFields,
        source_chain: ChainId,
        imported_ins: Vec<TransferableInput>,
    },
    Export {
        base: XBaseFields,
        destination_chain: ChainId,
        exported_outs: Vec<TransferableOutput>,
    },
}

impl XTransaction {
    pub fn base(&self) -> &XBaseFields {
        match self {
            XTransaction::Base { base }
            | XTransaction::CreateAsset { base, .. }
            | XTransaction::Operation { base, .. }
            | XTransaction::Import { base, .. }
            | XTransaction::Export { base, .. } => base,
        }
    }

    pub fn tx_id(&self) -> TxId {
        self.base().tx_id
    }
}
