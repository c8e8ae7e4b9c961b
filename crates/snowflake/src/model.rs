//! Normalized EVM records as returned by the ingestion service.
//!
//! Monetary fields arrive as decimal strings and stay that way: every
//! arithmetic step runs over arbitrary-precision integers, never floats.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedBlock {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub base_fee_per_gas: Option<String>,
    pub miner: String,
    pub difficulty: String,
    pub size: u64,
    pub transactions_root: String,
    pub receipts_root: String,
    pub state_root: String,
    #[serde(default)]
    pub extra_data: Vec<u8>,
    pub transactions: Vec<NormalizedTx>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTx {
    pub hash: String,
    pub from: String,
    /// `None` for contract creation
    pub to: Option<String>,
    pub nonce: u64,
    pub index: u32,
    pub value: String,
    #[serde(default)]
    pub input: Vec<u8>,
    pub gas_limit: u64,
    pub gas_price: Option<String>,
    pub max_fee_per_gas: Option<String>,
    pub max_priority_fee_per_gas: Option<String>,
    pub tx_type: u8,
    pub receipt: NormalizedReceipt,
    #[serde(default)]
    pub traces: Vec<TraceNode>,
}

impl NormalizedTx {
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReceipt {
    pub status: u64,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    /// Empty for pre-London blocks; encoded as 0 downstream
    pub effective_gas_price: Option<String>,
    pub contract_address: Option<String>,
    #[serde(default)]
    pub logs: Vec<NormalizedLog>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedLog {
    pub address: String,
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: Vec<u8>,
    pub log_index: u32,
}

/// One node of the call-trace tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceNode {
    /// The node's own identifier within the trace
    pub call_index: u32,
    pub call_type: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas: u64,
    pub gas_used: u64,
    #[serde(default)]
    pub input: Vec<u8>,
    #[serde(default)]
    pub output: Vec<u8>,
    pub error: Option<String>,
    #[serde(default)]
    pub calls: Vec<TraceNode>,
}
