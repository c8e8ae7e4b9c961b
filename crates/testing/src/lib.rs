//! Fixtures and builders shared by the integration tests.

use serac_avalanche::model::*;
use serac_core::{ChainTag, Id32, NetworkParams};

pub mod stores;

pub use stores::TempStores;

pub fn test_id(byte: u8) -> Id32 {
    Id32([byte; 32])
}

/// A stable fake network: the X and C chain ids are recognizable fillers so
/// cross-chain assertions read clearly.
pub fn test_params() -> NetworkParams {
    NetworkParams {
        network_id: 1337,
        name: "mainnet".into(),
        p_chain_id: Id32::default(),
        x_chain_id: test_id(0xEE),
        c_chain_id: test_id(0xCC),
        avax_asset_id: test_id(0xAA),
        hrp: "avax".into(),
    }
}

pub fn avax_out(amount: u64, address: &str) -> TransferableOutput {
    TransferableOutput {
        asset_id: test_id(0xAA),
        fx_id: None,
        output: Output::Transfer(TransferOutput {
            amount,
            locktime: 0,
            threshold: 1,
            addresses: vec![address.to_string()],
        }),
    }
}

pub fn p_transfer_block(
    height: u64,
    timestamp: u64,
    tx_id: Id32,
    outs: Vec<TransferableOutput>,
    ins: Vec<TransferableInput>,
) -> PBlock {
    PBlock {
        height,
        timestamp,
        block_id: Id32::for_output(&tx_id, u32::MAX),
        txs: vec![PTransaction::Base {
            base: PBaseFields {
                tx_id,
                outs,
                ins,
                memo: vec![],
            },
        }],
        reward_utxos: vec![],
    }
}

pub fn c_export_block(
    height: u64,
    timestamp: u64,
    tx_id: Id32,
    destination: Id32,
    exported_outs: Vec<TransferableOutput>,
) -> CBlock {
    CBlock {
        height,
        hash: format!("0x{height:x}"),
        parent_hash: format!("0x{:x}", height.saturating_sub(1)),
        timestamp,
        size: 1024,
        tx_count: 1,
        extra_data_hash: "0xed".into(),
        atomic_txs: vec![CAtomicTx::Export {
            tx_id,
            unsigned_bytes: vec![1, 2, 3],
            destination_chain: destination,
            inputs: vec![],
            exported_outs,
            credentials: vec![],
        }],
    }
}

pub fn p_import_block(
    height: u64,
    timestamp: u64,
    tx_id: Id32,
    source: Id32,
    imported: Vec<TransferableInput>,
    outs: Vec<TransferableOutput>,
) -> PBlock {
    PBlock {
        height,
        timestamp,
        block_id: Id32::for_output(&tx_id, u32::MAX),
        txs: vec![PTransaction::Import {
            base: PBaseFields {
                tx_id,
                outs,
                ins: vec![],
                memo: vec![],
            },
            source_chain: source,
            imported_ins: imported,
        }],
        reward_utxos: vec![],
    }
}

pub fn input_for(tx_id: Id32, index: u32, amount: u64) -> TransferableInput {
    TransferableInput {
        tx_id,
        output_index: index,
        asset_id: test_id(0xAA),
        amount,
    }
}

/// Convenience wrapper for chain-tag assertions in tests.
pub fn tags() -> [ChainTag; 3] {
    ChainTag::ALL
}
