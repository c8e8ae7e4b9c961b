//! P-chain transaction handling.
//!
//! Stake outputs index offset by `|outs|`; exported outputs double-write
//! into the destination partition; reward txs create UTXOs without
//! consuming the staking principal.

use serac_core::{ChainTag, IndexError, SpendInfo, UtxoBatch, UtxoStore, UtxoUpdate};

use crate::model::{PBaseFields, PBlock, PTransaction};

use super::{
    creation_update, foreign_partition, import_creation_fill, stake_update_extras, utxo_id_of,
    write_consumption, write_creation, BlockCoords, UtxoEngine,
};

pub(super) fn apply_block<S: UtxoStore, B: UtxoBatch>(
    batch: &mut B,
    engine: &UtxoEngine<S>,
    block: &PBlock,
) -> Result<(), IndexError> {
    let coords = BlockCoords {
        block_number: Some(block.height),
        timestamp: block.timestamp,
    };

    for tx in &block.txs {
        if let Some(base) = tx.base() {
            apply_base(batch, engine, base, coords)?;
        }

        match tx {
            PTransaction::Stake {
                base,
                node_id,
                stake_outs,
                start_time: _,
                end_time,
                reward_owner,
                ..
            } => {
                // stake outs follow the base outs in the index sequence; the
                // stake clock starts at the block that accepted the tx
                let offset = base.outs.len() as u32;
                let p_id = engine.params.p_chain_id;

                for (i, out) in stake_outs.iter().enumerate() {
                    let index = offset + i as u32;
                    let id = utxo_id_of(&base.tx_id, index);

                    let mut update = creation_update(out, &base.tx_id, index, p_id, p_id, coords);
                    stake_update_extras(
                        &mut update,
                        node_id,
                        block.timestamp,
                        *end_time,
                        &reward_owner.addresses,
                    );

                    write_creation(batch, ChainTag::Platform, &id, update)?;
                }
            }

            PTransaction::Import {
                base,
                source_chain,
                imported_ins,
            } => {
                let info = SpendInfo {
                    consuming_tx: base.tx_id,
                    consuming_time: block.timestamp,
                    consuming_block_number: block.height,
                    consumed_on_chain: engine.params.p_chain_id,
                    credentials: None,
                };

                let source = foreign_partition(&engine.params, source_chain, "p-chain import");

                for input in imported_ins {
                    let mut partitions = vec![ChainTag::Platform];
                    partitions.extend(source);

                    write_consumption(batch, &partitions, input, &info)?;
                    import_creation_fill(batch, engine, &partitions, source_chain, input, coords)?;
                }
            }

            PTransaction::Export {
                base,
                destination_chain,
                exported_outs,
            } => {
                let offset = base.outs.len() as u32;
                let p_id = engine.params.p_chain_id;

                let destination =
                    foreign_partition(&engine.params, destination_chain, "p-chain export");

                for (i, out) in exported_outs.iter().enumerate() {
                    let index = offset + i as u32;
                    let id = utxo_id_of(&base.tx_id, index);

                    let update =
                        creation_update(out, &base.tx_id, index, p_id, *destination_chain, coords);

                    write_creation(batch, ChainTag::Platform, &id, update.clone())?;

                    if let Some(destination) = destination {
                        write_creation(batch, destination, &id, update)?;
                    }
                }
            }

            PTransaction::RewardValidator { staking_tx_id, .. } => {
                // reward UTXOs come packed in the block payload; the staking
                // principal is returned, never marked consumed
                let p_id = engine.params.p_chain_id;

                for packed in block
                    .reward_utxos
                    .iter()
                    .filter(|u| u.staking_tx_id == *staking_tx_id)
                {
                    let id = packed.utxo_id();

                    let mut update = creation_update(
                        &packed.out,
                        &packed.tx_id,
                        packed.output_index,
                        p_id,
                        p_id,
                        coords,
                    );
                    update.is_reward = Some(true);

                    write_creation(batch, ChainTag::Platform, &id, update)?;
                }
            }

            _ => {}
        }
    }

    Ok(())
}

fn apply_base<S: UtxoStore, B: UtxoBatch>(
    batch: &mut B,
    engine: &UtxoEngine<S>,
    base: &PBaseFields,
    coords: BlockCoords,
) -> Result<(), IndexError> {
    let p_id = engine.params.p_chain_id;

    for (i, out) in base.outs.iter().enumerate() {
        let index = i as u32;
        let id = utxo_id_of(&base.tx_id, index);
        let update = creation_update(out, &base.tx_id, index, p_id, p_id, coords);
        write_creation(batch, ChainTag::Platform, &id, update)?;
    }

    let info = SpendInfo {
        consuming_tx: base.tx_id,
        consuming_time: coords.timestamp,
        consuming_block_number: coords.block_number.unwrap_or_default(),
        consumed_on_chain: p_id,
        credentials: None,
    };

    for input in &base.ins {
        write_consumption(batch, &[ChainTag::Platform], input, &info)?;
    }

    Ok(())
}
