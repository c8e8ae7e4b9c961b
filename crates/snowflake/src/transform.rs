//! Pure transformation of normalized blocks into the six row streams.
//!
//! Deterministic and side-effect free: the golden tests compare byte-exact
//! CSV renderings of the output. All money math is arbitrary-precision.

use base64::Engine as _;
use num_bigint::BigUint;

use crate::{
    model::{NormalizedBlock, NormalizedTx, TraceNode},
    rows::{
        BlockRow, ExportBatch, InternalTxRow, LogRow, MessageRow, ReceiptRow, TransactionRow,
    },
    ExportError,
};

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

pub const BASE_TX_GAS: u64 = 21_000;
pub const CREATE_TX_GAS: u64 = 32_000;
pub const ZERO_BYTE_GAS: u64 = 4;
pub const NONZERO_BYTE_GAS: u64 = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct TransformOptions {
    /// The reference warehouse maps `blockReceiptsRoot` to the state root, a
    /// schema oddity reproduced by default for golden parity. This flag emits
    /// the straight mapping instead.
    pub corrected_block_roots: bool,
}

pub fn transform(blocks: &[NormalizedBlock]) -> Result<ExportBatch, ExportError> {
    transform_with(blocks, TransformOptions::default())
}

pub fn transform_with(
    blocks: &[NormalizedBlock],
    options: TransformOptions,
) -> Result<ExportBatch, ExportError> {
    let mut batch = ExportBatch::default();

    for block in blocks {
        push_block(&mut batch, block, options)?;
    }

    Ok(batch)
}

fn push_block(
    batch: &mut ExportBatch,
    block: &NormalizedBlock,
    options: TransformOptions,
) -> Result<(), ExportError> {
    let block_receipts_root = if options.corrected_block_roots {
        &block.receipts_root
    } else {
        &block.state_root
    };

    batch.blocks.push(BlockRow {
        block_number: block.number,
        block_hash: lower(&block.hash),
        parent_hash: lower(&block.parent_hash),
        block_timestamp: block.timestamp,
        transactions_count: block.transactions.len() as u64,
        gas_limit: block.gas_limit,
        gas_used: block.gas_used,
        base_fee_per_gas: dec_or_zero(block.base_fee_per_gas.as_deref())?,
        miner: lower(&block.miner),
        difficulty: dec_or_zero(Some(&block.difficulty))?,
        size: block.size,
        transactions_root: lower(&block.transactions_root),
        block_receipt_hash: lower(&block.receipts_root),
        block_receipts_root: lower(block_receipts_root),
        block_state_root: lower(&block.state_root),
        extra_data: B64.encode(&block.extra_data),
    });

    for tx in &block.transactions {
        push_tx(batch, block.number, tx)?;
    }

    Ok(())
}

fn push_tx(batch: &mut ExportBatch, block_number: u64, tx: &NormalizedTx) -> Result<(), ExportError> {
    let effective = dec_or_zero(tx.receipt.effective_gas_price.as_deref())?;
    let value = parse_uint(&tx.value)?;

    // transactionCost = gasLimit × effectiveGasPrice + value, exact
    let cost = BigUint::from(tx.gas_limit) * parse_uint(&effective)? + &value;

    let gas_price = dec_or_zero(tx.gas_price.as_deref())?;

    // legacy txs carry no fee-cap fields; both default to the gas price
    let max_fee = match tx.max_fee_per_gas.as_deref() {
        Some(text) => normalize_uint(text)?,
        None => gas_price.clone(),
    };
    let max_priority = match tx.max_priority_fee_per_gas.as_deref() {
        Some(text) => normalize_uint(text)?,
        None => gas_price.clone(),
    };

    // contract creation serializes the recipient as the distinguished empty
    // address, never as a blank string
    let to_address = match tx.to.as_deref() {
        Some(to) => lower(to),
        None => "0x".to_string(),
    };

    batch.transactions.push(TransactionRow {
        block_number,
        transaction_hash: lower(&tx.hash),
        transaction_index: tx.index,
        from_address: lower(&tx.from),
        to_address: to_address.clone(),
        nonce: tx.nonce,
        value: value.to_string(),
        gas_limit: tx.gas_limit,
        gas_price,
        max_fee_per_gas: max_fee,
        max_priority_fee_per_gas: max_priority,
        transaction_type: tx.tx_type,
        transaction_cost: cost.to_string(),
    });

    batch.receipts.push(ReceiptRow {
        block_number,
        transaction_hash: lower(&tx.hash),
        status: tx.receipt.status,
        gas_used: tx.receipt.gas_used,
        cumulative_gas_used: tx.receipt.cumulative_gas_used,
        effective_gas_price: effective.clone(),
        contract_address: tx
            .receipt
            .contract_address
            .as_deref()
            .map(lower)
            .unwrap_or_else(|| "0x".to_string()),
        logs_count: tx.receipt.logs.len() as u64,
    });

    for log in &tx.receipt.logs {
        let topic = |i: usize| log.topics.get(i).map(|t| lower(t)).unwrap_or_default();

        batch.logs.push(LogRow {
            block_number,
            transaction_hash: lower(&tx.hash),
            log_index: log.log_index,
            address: lower(&log.address),
            topic0: topic(0),
            topic1: topic(1),
            topic2: topic(2),
            topic3: topic(3),
            data: hex_field(&log.data),
        });
    }

    let intrinsic = intrinsic_gas(&tx.input, tx.is_contract_creation());
    let mut position = 0u32;

    for root in &tx.traces {
        push_trace(batch, block_number, &tx.hash, root, true, intrinsic, &mut position)?;
    }

    batch.messages.push(MessageRow {
        block_number,
        transaction_hash: lower(&tx.hash),
        transaction_index: tx.index,
        from_address: lower(&tx.from),
        to_address,
        value: value.to_string(),
        gas_limit: tx.gas_limit,
        transaction_message_gas_price: effective,
        nonce: tx.nonce,
        data: hex_field(&tx.input),
    });

    Ok(())
}

fn push_trace(
    batch: &mut ExportBatch,
    block_number: u64,
    tx_hash: &str,
    node: &TraceNode,
    is_root: bool,
    intrinsic: u64,
    position: &mut u32,
) -> Result<(), ExportError> {
    // the root frame reports gas including the intrinsic charge; internal
    // rows carry the execution share only
    let (gas, gas_used) = if is_root {
        (
            node.gas.saturating_sub(intrinsic),
            node.gas_used.saturating_sub(intrinsic),
        )
    } else {
        (node.gas, node.gas_used)
    };

    batch.internal_txs.push(InternalTxRow {
        block_number,
        transaction_hash: lower(tx_hash),
        trace_position: *position,
        call_index: node.call_index,
        call_type: node.call_type.clone(),
        from_address: lower(&node.from),
        to_address: lower(&node.to),
        value: dec_or_zero(Some(&node.value))?,
        gas,
        gas_used,
        output: hex_field(&node.output),
        error: node.error.clone().unwrap_or_default(),
    });

    *position += 1;

    for child in &node.calls {
        push_trace(batch, block_number, tx_hash, child, false, intrinsic, position)?;
    }

    Ok(())
}

/// 21 000 base, plus 32 000 for CREATE, plus the per-byte calldata charge.
pub fn intrinsic_gas(input: &[u8], is_create: bool) -> u64 {
    let base = if is_create {
        BASE_TX_GAS + CREATE_TX_GAS
    } else {
        BASE_TX_GAS
    };

    let data: u64 = input
        .iter()
        .map(|byte| {
            if *byte == 0 {
                ZERO_BYTE_GAS
            } else {
                NONZERO_BYTE_GAS
            }
        })
        .sum();

    base + data
}

fn lower(text: &str) -> String {
    text.to_ascii_lowercase()
}

/// `0x`-prefixed hex; empty input stays `0x`, never a blank string.
fn hex_field(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn parse_uint(text: &str) -> Result<BigUint, ExportError> {
    if text.is_empty() {
        return Ok(BigUint::default());
    }

    text.parse()
        .map_err(|_| ExportError::Ingestion(format!("not a decimal integer: {text:?}")))
}

/// Parse and reserialize so `007`, `` and `0` all render the same way.
fn normalize_uint(text: &str) -> Result<String, ExportError> {
    Ok(parse_uint(text)?.to_string())
}

fn dec_or_zero(text: Option<&str>) -> Result<String, ExportError> {
    match text {
        None => Ok("0".to_string()),
        Some(text) => normalize_uint(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NormalizedReceipt;

    fn receipt(effective: Option<&str>, gas_used: u64) -> NormalizedReceipt {
        NormalizedReceipt {
            status: 1,
            gas_used,
            cumulative_gas_used: gas_used,
            effective_gas_price: effective.map(str::to_string),
            contract_address: None,
            logs: vec![],
        }
    }

    fn simple_tx() -> NormalizedTx {
        NormalizedTx {
            hash: "0xAB01".into(),
            from: "0xFEED".into(),
            to: Some("0xBEEF".into()),
            nonce: 7,
            index: 0,
            value: "43028689390000000000".into(),
            input: vec![],
            gas_limit: 21_000,
            gas_price: None,
            max_fee_per_gas: Some("15000000000".into()),
            max_priority_fee_per_gas: Some("2000000000".into()),
            tx_type: 2,
            receipt: receipt(Some("3000000000"), 21_000),
            traces: vec![],
        }
    }

    fn block(txs: Vec<NormalizedTx>) -> NormalizedBlock {
        NormalizedBlock {
            number: 100,
            hash: "0xB10C".into(),
            parent_hash: "0xB0FF".into(),
            timestamp: 1_700_000_000,
            gas_limit: 15_000_000,
            gas_used: 21_000,
            base_fee_per_gas: Some("25000000000".into()),
            miner: "0xC0DE".into(),
            difficulty: "1".into(),
            size: 1234,
            transactions_root: "0xT".into(),
            receipts_root: "0xRECEIPTS".into(),
            state_root: "0xSTATE".into(),
            extra_data: b"atomic".to_vec(),
            transactions: txs,
        }
    }

    #[test]
    fn transaction_cost_is_exact() {
        let batch = transform(&[block(vec![simple_tx()])]).unwrap();

        // 21000 × 3_000_000_000 + 43_028_689_390_000_000_000
        assert_eq!(
            batch.transactions[0].transaction_cost,
            "43028752390000000000"
        );
    }

    #[test]
    fn cardinality_per_transaction() {
        let batch = transform(&[block(vec![simple_tx(), simple_tx()])]).unwrap();

        assert_eq!(batch.blocks.len(), 1);
        assert_eq!(batch.transactions.len(), 2);
        assert_eq!(batch.receipts.len(), 2);
        assert_eq!(batch.messages.len(), 2);
        assert!(batch.logs.is_empty());
        assert!(batch.internal_txs.is_empty());
    }

    #[test]
    fn legacy_fee_fields_default_to_gas_price() {
        let mut tx = simple_tx();
        tx.tx_type = 0;
        tx.gas_price = Some("470000000000".into());
        tx.max_fee_per_gas = None;
        tx.max_priority_fee_per_gas = None;

        let batch = transform(&[block(vec![tx])]).unwrap();
        let row = &batch.transactions[0];

        assert_eq!(row.gas_price, "470000000000");
        assert_eq!(row.max_fee_per_gas, "470000000000");
        assert_eq!(row.max_priority_fee_per_gas, "470000000000");
    }

    #[test]
    fn contract_creation_recipient_is_empty_address() {
        let mut tx = simple_tx();
        tx.to = None;
        tx.receipt.contract_address = Some("0xNEW".into());

        let batch = transform(&[block(vec![tx])]).unwrap();

        assert_eq!(batch.transactions[0].to_address, "0x");
        assert_eq!(batch.messages[0].to_address, "0x");
        assert_eq!(batch.receipts[0].contract_address, "0xnew");
    }

    #[test]
    fn pre_london_gas_price_encodes_as_zero() {
        let mut tx = simple_tx();
        tx.receipt.effective_gas_price = None;

        let batch = transform(&[block(vec![tx])]).unwrap();

        assert_eq!(batch.receipts[0].effective_gas_price, "0");
        assert_eq!(batch.messages[0].transaction_message_gas_price, "0");
        // cost degrades to the plain value
        assert_eq!(
            batch.transactions[0].transaction_cost,
            "43028689390000000000"
        );
    }

    #[test]
    fn addresses_are_lowercased_and_extra_data_base64() {
        let batch = transform(&[block(vec![simple_tx()])]).unwrap();

        assert_eq!(batch.transactions[0].from_address, "0xfeed");
        assert_eq!(batch.transactions[0].to_address, "0xbeef");
        assert_eq!(batch.blocks[0].extra_data, "YXRvbWlj");
    }

    #[test]
    fn block_root_quirk_is_reproduced_by_default() {
        let batch = transform(&[block(vec![])]).unwrap();
        let row = &batch.blocks[0];

        assert_eq!(row.block_receipt_hash, "0xreceipts");
        assert_eq!(row.block_receipts_root, "0xstate");
        assert_eq!(row.block_state_root, "0xstate");
    }

    #[test]
    fn corrected_mode_emits_straight_roots() {
        let batch = transform_with(
            &[block(vec![])],
            TransformOptions {
                corrected_block_roots: true,
            },
        )
        .unwrap();
        let row = &batch.blocks[0];

        assert_eq!(row.block_receipt_hash, "0xreceipts");
        assert_eq!(row.block_receipts_root, "0xreceipts");
        assert_eq!(row.block_state_root, "0xstate");
    }

    fn traced_tx() -> NormalizedTx {
        let mut tx = simple_tx();
        tx.input = vec![0, 0, 1, 2];
        tx.gas_limit = 100_000;
        tx.traces = vec![TraceNode {
            call_index: 0,
            call_type: "CALL".into(),
            from: "0xFEED".into(),
            to: "0xBEEF".into(),
            value: "0".into(),
            gas: 100_000,
            gas_used: 60_000,
            input: vec![],
            output: vec![],
            error: None,
            calls: vec![
                TraceNode {
                    call_index: 1,
                    call_type: "STATICCALL".into(),
                    from: "0xBEEF".into(),
                    to: "0xCAFE".into(),
                    value: "0".into(),
                    gas: 50_000,
                    gas_used: 10_000,
                    input: vec![],
                    output: vec![0xFF],
                    error: None,
                    calls: vec![TraceNode {
                        call_index: 3,
                        call_type: "CALL".into(),
                        from: "0xCAFE".into(),
                        to: "0xD00D".into(),
                        value: "0".into(),
                        gas: 20_000,
                        gas_used: 5_000,
                        input: vec![],
                        output: vec![],
                        error: Some("execution reverted".into()),
                        calls: vec![],
                    }],
                },
                TraceNode {
                    call_index: 2,
                    call_type: "DELEGATECALL".into(),
                    from: "0xBEEF".into(),
                    to: "0xF00D".into(),
                    value: "0".into(),
                    gas: 30_000,
                    gas_used: 8_000,
                    input: vec![],
                    output: vec![],
                    error: None,
                    calls: vec![],
                },
            ],
        }];
        tx
    }

    #[test]
    fn trace_positions_follow_depth_first_order() {
        let batch = transform(&[block(vec![traced_tx()])]).unwrap();

        let positions: Vec<_> = batch
            .internal_txs
            .iter()
            .map(|row| (row.trace_position, row.call_index))
            .collect();

        // DFS: root, first child, grandchild, second child
        assert_eq!(positions, vec![(0, 0), (1, 1), (2, 3), (3, 2)]);

        assert_eq!(batch.internal_txs[2].error, "execution reverted");
        assert_eq!(batch.internal_txs[1].output, "0xff");
    }

    #[test]
    fn root_trace_has_intrinsic_gas_subtracted() {
        let batch = transform(&[block(vec![traced_tx()])]).unwrap();

        // input 0x00 00 01 02: 2 zero bytes + 2 nonzero bytes
        let intrinsic = 21_000 + 2 * 4 + 2 * 16;
        assert_eq!(intrinsic_gas(&[0, 0, 1, 2], false), intrinsic);

        let root = &batch.internal_txs[0];
        assert_eq!(root.gas, 100_000 - intrinsic);
        assert_eq!(root.gas_used, 60_000 - intrinsic);

        // children are untouched
        assert_eq!(batch.internal_txs[1].gas, 50_000);
    }

    #[test]
    fn create_intrinsic_includes_the_create_charge() {
        assert_eq!(intrinsic_gas(&[], true), 53_000);
        assert_eq!(intrinsic_gas(&[7], true), 53_016);
    }

    #[test]
    fn transform_is_deterministic() {
        let blocks = [block(vec![traced_tx(), simple_tx()])];

        let first = transform(&blocks).unwrap().render_csv().unwrap();
        let second = transform(&blocks).unwrap().render_csv().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn golden_blocks_csv() {
        let batch = transform(&[block(vec![simple_tx()])]).unwrap();
        let [blocks_csv, tx_csv, ..] = batch.render_csv().unwrap();

        let expected_blocks = "\
block_number,block_hash,parent_hash,block_timestamp,transactions_count,gas_limit,gas_used,base_fee_per_gas,miner,difficulty,size,transactions_root,block_receipt_hash,block_receipts_root,block_state_root,extra_data\n\
100,0xb10c,0xb0ff,1700000000,1,15000000,21000,25000000000,0xc0de,1,1234,0xt,0xreceipts,0xstate,0xstate,YXRvbWlj\n";

        assert_eq!(blocks_csv, expected_blocks);

        let expected_txs = "\
block_number,transaction_hash,transaction_index,from_address,to_address,nonce,value,gas_limit,gas_price,max_fee_per_gas,max_priority_fee_per_gas,transaction_type,transaction_cost\n\
100,0xab01,0,0xfeed,0xbeef,7,43028689390000000000,21000,0,15000000000,2000000000,2,43028752390000000000\n";

        assert_eq!(tx_csv, expected_txs);
    }
}
