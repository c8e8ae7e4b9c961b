//! X-chain transaction handling, both eras.
//!
//! Output index offsets are the critical part: base outs first, then
//! exported outs / created-asset state outs / operation outs at increasing
//! indices. Pre-Cortina txs take their timestamp from the archive, never
//! from this node's acceptance time.

use serac_core::{AssetInfo, ChainTag, IndexError, SpendInfo, UtxoBatch, UtxoStore, UtxoUpdate};

use crate::{
    model::{TransferableInput, TransferableOutput, XBaseFields, XBlock, XTransaction, XTxRecord},
    ChainError,
};

use super::{
    creation_update, foreign_partition, import_creation_fill, utxo_id_of, write_consumption,
    write_creation, BlockCoords, UtxoEngine,
};

pub(super) fn apply_block<S: UtxoStore, B: UtxoBatch>(
    batch: &mut B,
    engine: &UtxoEngine<S>,
    block: &XBlock,
) -> Result<(), IndexError> {
    let coords = BlockCoords {
        block_number: Some(block.height),
        timestamp: block.timestamp,
    };

    for tx in &block.txs {
        apply_tx(batch, engine, tx, coords)?;
    }

    Ok(())
}

/// A sequential-log tx: no block, real timestamp from the archive. A missing
/// archive or a missing entry is fatal; acceptance time is not a substitute.
pub(super) fn apply_pre_cortina_tx<S: UtxoStore, B: UtxoBatch>(
    batch: &mut B,
    engine: &UtxoEngine<S>,
    record: &XTxRecord,
) -> Result<(), IndexError> {
    let archive = engine
        .archive
        .as_ref()
        .ok_or_else(|| IndexError::from(ChainError::ArchiveUnavailable))?;

    let tx_id = record.tx.tx_id();

    let timestamp = archive
        .lookup(tx_id.as_bytes())
        .ok_or_else(|| IndexError::from(ChainError::MissingTimestamp(tx_id)))?;

    let coords = BlockCoords {
        block_number: None,
        timestamp,
    };

    apply_tx(batch, engine, &record.tx, coords)
}

fn apply_tx<S: UtxoStore, B: UtxoBatch>(
    batch: &mut B,
    engine: &UtxoEngine<S>,
    tx: &XTransaction,
    coords: BlockCoords,
) -> Result<(), IndexError> {
    let base = tx.base();
    apply_base(batch, engine, base, coords)?;

    let mut next_index = base.outs.len() as u32;

    match tx {
        XTransaction::Base { .. } => {}

        XTransaction::CreateAsset {
            base,
            name,
            symbol,
            denomination,
            states,
        } => {
            // the created asset's id is the tx id itself
            batch.put_asset(&AssetInfo {
                asset_id: base.tx_id,
                name: name.clone(),
                symbol: symbol.clone(),
                denomination: *denomination,
            })?;

            for state in states {
                for out in &state.outs {
                    let wrapped = TransferableOutput {
                        asset_id: base.tx_id,
                        fx_id: state.fx_id,
                        output: out.clone(),
                    };
                    write_own_output(batch, engine, base, &wrapped, next_index, coords)?;
                    next_index += 1;
                }
            }
        }

        XTransaction::Operation { base, ops } => {
            let info = SpendInfo {
                consuming_tx: base.tx_id,
                consuming_time: coords.timestamp,
                consuming_block_number: coords.block_number.unwrap_or_default(),
                consumed_on_chain: engine.params.x_chain_id,
                credentials: None,
            };

            for op in ops {
                for (ref_tx, ref_index) in &op.utxo_refs {
                    let consumed = TransferableInput {
                        tx_id: *ref_tx,
                        output_index: *ref_index,
                        asset_id: op.asset_id,
                        amount: 0,
                    };
                    write_consumption(batch, &[ChainTag::Exchange], &consumed, &info)?;
                }

                for out in &op.outs {
                    let wrapped = TransferableOutput {
                        asset_id: op.asset_id,
                        fx_id: None,
                        output: out.clone(),
                    };
                    write_own_output(batch, engine, base, &wrapped, next_index, coords)?;
                    next_index += 1;
                }
            }
        }

        XTransaction::Import {
            base,
            source_chain,
            imported_ins,
        } => {
            let info = SpendInfo {
                consuming_tx: base.tx_id,
                consuming_time: coords.timestamp,
                consuming_block_number: coords.block_number.unwrap_or_default(),
                consumed_on_chain: engine.params.x_chain_id,
                credentials: None,
            };

            let source = foreign_partition(&engine.params, source_chain, "x-chain import");

            for input in imported_ins {
                let mut partitions = vec![ChainTag::Exchange];
                partitions.extend(source);

                write_consumption(batch, &partitions, input, &info)?;
                import_creation_fill(batch, engine, &partitions, source_chain, input, coords)?;
            }
        }

        XTransaction::Export {
            base,
            destination_chain,
            exported_outs,
        } => {
            let x_id = engine.params.x_chain_id;
            let destination =
                foreign_partition(&engine.params, destination_chain, "x-chain export");

            for out in exported_outs {
                let id = utxo_id_of(&base.tx_id, next_index);

                let update =
                    creation_update(out, &base.tx_id, next_index, x_id, *destination_chain, coords);

                write_creation(batch, ChainTag::Exchange, &id, update.clone())?;

                if let Some(destination) = destination {
                    write_creation(batch, destination, &id, update)?;
                }

                next_index += 1;
            }
        }
    }

    Ok(())
}

fn apply_base<S: UtxoStore, B: UtxoBatch>(
    batch: &mut B,
    engine: &UtxoEngine<S>,
    base: &XBaseFields,
    coords: BlockCoords,
) -> Result<(), IndexError> {
    let x_id = engine.params.x_chain_id;

    for (i, out) in base.outs.iter().enumerate() {
        let index = i as u32;
        let id = utxo_id_of(&base.tx_id, index);
        let update = creation_update(out, &base.tx_id, index, x_id, x_id, coords);
        write_creation(batch, ChainTag::Exchange, &id, update)?;
    }

    let info = SpendInfo {
        consuming_tx: base.tx_id,
        consuming_time: coords.timestamp,
        consuming_block_number: coords.block_number.unwrap_or_default(),
        consumed_on_chain: x_id,
        credentials: None,
    };

    for input in &base.ins {
        write_consumption(batch, &[ChainTag::Exchange], input, &info)?;
    }

    Ok(())
}

fn write_own_output<S: UtxoStore, B: UtxoBatch>(
    batch: &mut B,
    engine: &UtxoEngine<S>,
    base: &XBaseFields,
    out: &TransferableOutput,
    index: u32,
    coords: BlockCoords,
) -> Result<(), IndexError> {
    let x_id = engine.params.x_chain_id;
    let id = utxo_id_of(&base.tx_id, index);
    let update = creation_update(out, &base.tx_id, index, x_id, x_id, coords);
    write_creation(batch, ChainTag::Exchange, &id, update)
}
