//! The six relational row streams and their CSV rendering.
//!
//! Column order here is the warehouse column order; the CSV rendering is the
//! golden-test surface, so the serialize field order is part of the
//! contract.

use serde::Serialize;

use crate::ExportError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockRow {
    pub block_number: u64,
    pub block_hash: String,
    pub parent_hash: String,
    pub block_timestamp: u64,
    pub transactions_count: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub base_fee_per_gas: String,
    pub miner: String,
    pub difficulty: String,
    pub size: u64,
    pub transactions_root: String,
    pub block_receipt_hash: String,
    pub block_receipts_root: String,
    pub block_state_root: String,
    /// base64-encoded when emitted to the warehouse
    pub extra_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRow {
    pub block_number: u64,
    pub transaction_hash: String,
    pub transaction_index: u32,
    pub from_address: String,
    /// `0x` for contract creation, never blank
    pub to_address: String,
    pub nonce: u64,
    pub value: String,
    pub gas_limit: u64,
    pub gas_price: String,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub transaction_type: u8,
    /// gasLimit × effectiveGasPrice + value, exact integer
    pub transaction_cost: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptRow {
    pub block_number: u64,
    pub transaction_hash: String,
    pub status: u64,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    pub effective_gas_price: String,
    pub contract_address: String,
    pub logs_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRow {
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u32,
    pub address: String,
    pub topic0: String,
    pub topic1: String,
    pub topic2: String,
    pub topic3: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternalTxRow {
    pub block_number: u64,
    pub transaction_hash: String,
    /// Counter incremented in depth-first order over the whole trace tree
    pub trace_position: u32,
    pub call_index: u32,
    pub call_type: String,
    pub from_address: String,
    pub to_address: String,
    pub value: String,
    pub gas: u64,
    pub gas_used: u64,
    pub output: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRow {
    pub block_number: u64,
    pub transaction_hash: String,
    pub transaction_index: u32,
    pub from_address: String,
    pub to_address: String,
    pub value: String,
    pub gas_limit: u64,
    /// The receipt's effective gas price; 0 for pre-London blocks
    pub transaction_message_gas_price: String,
    pub nonce: u64,
    pub data: String,
}

/// One block range's worth of rows, committed atomically or not at all.
///
/// Cardinality per block: one Block row; per transaction: one Transaction,
/// one Receipt, one Message row, zero-or-more Log rows, zero-or-more
/// InternalTx rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportBatch {
    pub blocks: Vec<BlockRow>,
    pub transactions: Vec<TransactionRow>,
    pub receipts: Vec<ReceiptRow>,
    pub logs: Vec<LogRow>,
    pub internal_txs: Vec<InternalTxRow>,
    pub messages: Vec<MessageRow>,
}

impl ExportBatch {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

fn to_csv<R: Serialize>(rows: &[R]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ExportError::Schema(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Schema(e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| ExportError::Schema(e.to_string()))
}

impl ExportBatch {
    /// Deterministic rendering used by the golden tests: same input batch,
    /// byte-identical output.
    pub fn render_csv(&self) -> Result<[String; 6], ExportError> {
        Ok([
            to_csv(&self.blocks)?,
            to_csv(&self.transactions)?,
            to_csv(&self.receipts)?,
            to_csv(&self.logs)?,
            to_csv(&self.internal_txs)?,
            to_csv(&self.messages)?,
        ])
    }
}
