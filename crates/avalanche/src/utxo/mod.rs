//! The cross-chain UTXO indexing engine.
//!
//! Every output lands as a chain-partitioned record through `upsert`; every
//! consumption is one append to the shared spend index under the consuming
//! chain's prefix. Cross-chain UTXOs are double-written into both partitions
//! named by `(created_on, consumed_on)`, by whichever side gets indexed
//! first; upsert commutativity is what makes the arrival order irrelevant.

use std::sync::Arc;

use serac_core::{
    BlockIndexer, BlockHeight, ChainId, ChainTag, Credential, Id32, IndexError, NetworkParams,
    SpendInfo, StageWatermark, StoredUtxo, TxId, TxIndexer, UnixTime, UtxoBatch, UtxoId,
    UtxoKind, UtxoStore, UtxoUpdate,
};
use tracing::warn;

use crate::{
    archive::TimestampArchive,
    model::{CBlock, PBlock, TransferableInput, TransferableOutput, XBlock, XTxRecord},
    rpc::AtomicInfoProbe,
};

mod balance;
mod contract;
mod exchange;
mod platform;
mod query;

#[cfg(test)]
pub(crate) mod memstore;
#[cfg(test)]
mod tests;

pub use balance::*;
pub use query::*;

pub struct UtxoEngine<S: UtxoStore> {
    store: S,
    params: NetworkParams,
    archive: Option<Arc<TimestampArchive>>,
    atomic_probe: Option<Arc<dyn AtomicInfoProbe>>,
}

impl<S: UtxoStore> UtxoEngine<S> {
    pub fn new(store: S, params: NetworkParams) -> Self {
        Self {
            store,
            params,
            archive: None,
            atomic_probe: None,
        }
    }

    pub fn with_archive(mut self, archive: Arc<TimestampArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_atomic_probe(mut self, probe: Arc<dyn AtomicInfoProbe>) -> Self {
        self.atomic_probe = Some(probe);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }
}

impl<S: UtxoStore> BlockIndexer<PBlock> for UtxoEngine<S> {
    fn name(&self) -> &'static str {
        "utxos"
    }

    fn watermark(&self) -> Result<Option<BlockHeight>, IndexError> {
        Ok(self.store.watermark(StageWatermark::Platform)?)
    }

    fn process_batch(&self, blocks: &[PBlock]) -> Result<(), IndexError> {
        let Some(last) = blocks.last() else {
            return Ok(());
        };

        let mut batch = self.store.start_batch()?;

        for block in blocks {
            platform::apply_block(&mut batch, self, block)?;
        }

        batch.set_watermark(StageWatermark::Platform, last.height)?;
        batch.commit()?;

        Ok(())
    }
}

impl<S: UtxoStore> BlockIndexer<XBlock> for UtxoEngine<S> {
    fn name(&self) -> &'static str {
        "utxos"
    }

    fn watermark(&self) -> Result<Option<BlockHeight>, IndexError> {
        Ok(self.store.watermark(StageWatermark::ExchangeBlocks)?)
    }

    fn process_batch(&self, blocks: &[XBlock]) -> Result<(), IndexError> {
        let Some(last) = blocks.last() else {
            return Ok(());
        };

        let mut batch = self.store.start_batch()?;

        for block in blocks {
            exchange::apply_block(&mut batch, self, block)?;
        }

        batch.set_watermark(StageWatermark::ExchangeBlocks, last.height)?;
        batch.commit()?;

        Ok(())
    }
}

impl<S: UtxoStore> BlockIndexer<CBlock> for UtxoEngine<S> {
    fn name(&self) -> &'static str {
        "utxos"
    }

    fn watermark(&self) -> Result<Option<BlockHeight>, IndexError> {
        Ok(self.store.watermark(StageWatermark::Contract)?)
    }

    fn process_batch(&self, blocks: &[CBlock]) -> Result<(), IndexError> {
        let Some(last) = blocks.last() else {
            return Ok(());
        };

        let mut batch = self.store.start_batch()?;

        for block in blocks {
            contract::apply_block(&mut batch, self, block)?;
        }

        batch.set_watermark(StageWatermark::Contract, last.height)?;
        batch.commit()?;

        Ok(())
    }
}

impl<S: UtxoStore> TxIndexer<XTxRecord> for UtxoEngine<S> {
    fn name(&self) -> &'static str {
        "utxos"
    }

    fn tx_watermark(&self) -> Result<Option<u64>, IndexError> {
        Ok(self.store.watermark(StageWatermark::ExchangePreCortina)?)
    }

    fn process_tx_batch(&self, txs: &[XTxRecord]) -> Result<(), IndexError> {
        let Some(last) = txs.last() else {
            return Ok(());
        };

        let mut batch = self.store.start_batch()?;

        for record in txs {
            exchange::apply_pre_cortina_tx(&mut batch, self, record)?;
        }

        batch.set_watermark(StageWatermark::ExchangePreCortina, last.index)?;
        batch.commit()?;

        Ok(())
    }
}

/// Where an output was created, relative to the block being indexed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockCoords {
    pub block_number: Option<BlockHeight>,
    pub timestamp: UnixTime,
}

/// Build the creation-side update for one output.
#[allow(clippy::too_many_arguments)]
pub(crate) fn creation_update(
    out: &TransferableOutput,
    tx_id: &TxId,
    output_index: u32,
    created_on: ChainId,
    consumed_on: ChainId,
    coords: BlockCoords,
) -> UtxoUpdate {
    UtxoUpdate {
        tx_id: Some(*tx_id),
        output_index: Some(output_index),
        asset_id: Some(out.asset_id),
        amount: out.output.amount().map(|a| a.to_string()),
        addresses: Some(out.output.addresses().to_vec()),
        threshold: Some(out.output.threshold()),
        kind: Some(out.output.kind()),
        platform_locktime: Some(out.output.locktime()),
        stakeable_locktime: out.output.stakeable_locktime(),
        created_on_chain: Some(created_on),
        consumed_on_chain: Some(consumed_on),
        block_number: coords.block_number,
        block_timestamp: Some(coords.timestamp),
        utxo_bytes: Some(out.canonical_bytes()),
        payload: out.output.payload().map(|p| p.to_vec()),
        group_id: out.output.group_id(),
        fx_id: out.fx_id,
        ..Default::default()
    }
}

/// Upsert a freshly created output into one chain partition and index its
/// addresses.
pub(crate) fn write_creation<B: UtxoBatch>(
    batch: &mut B,
    partition: ChainTag,
    id: &UtxoId,
    update: UtxoUpdate,
) -> Result<(), IndexError> {
    let addresses = update.addresses.clone().unwrap_or_default();

    batch.upsert(partition, id, update)?;

    for address in addresses {
        batch.index_address(partition, &address, id)?;
    }

    Ok(())
}

/// Mark one input consumed: spend-index append under every named partition
/// plus a consumption upsert so partial records carry `consumed_on_chain`.
pub(crate) fn write_consumption<B: UtxoBatch>(
    batch: &mut B,
    partitions: &[ChainTag],
    input: &TransferableInput,
    info: &SpendInfo,
) -> Result<(), IndexError> {
    let id = input.utxo_id();

    for partition in partitions {
        batch.mark_spent(*partition, &id, info)?;

        batch.upsert(
            *partition,
            &id,
            UtxoUpdate {
                tx_id: Some(input.tx_id),
                output_index: Some(input.output_index),
                asset_id: Some(input.asset_id),
                // operation refs carry no amount; never clobber a real one
                amount: (input.amount > 0).then(|| input.amount.to_string()),
                consumed_on_chain: Some(info.consumed_on_chain),
                ..Default::default()
            },
        )?;
    }

    Ok(())
}

/// Resolve the partition tag for a foreign chain id. Unknown chains produce a
/// notice and no write: the record stays partial.
pub(crate) fn foreign_partition(
    params: &NetworkParams,
    chain: &ChainId,
    context: &str,
) -> Option<ChainTag> {
    let tag = params.tag_for_chain(chain);

    if tag.is_none() {
        warn!(%chain, context, "cross-chain reference to a chain this node does not index");
    }

    tag
}

/// Fill creation coords on an imported record: real coords when the atomic
/// probe can resolve them, fallback coords from the importing block
/// otherwise. The fallback only lands when no earlier creation data exists.
pub(crate) fn import_creation_fill<S: UtxoStore, B: UtxoBatch>(
    batch: &mut B,
    engine: &UtxoEngine<S>,
    partitions: &[ChainTag],
    source_chain: &ChainId,
    input: &TransferableInput,
    coords: BlockCoords,
) -> Result<(), IndexError> {
    let id = input.utxo_id();

    let resolved = engine
        .atomic_probe
        .as_ref()
        .filter(|_| *source_chain == engine.params.c_chain_id)
        .and_then(|probe| match probe.atomic_tx_info(source_chain, &input.tx_id) {
            Ok(info) => Some(info),
            Err(err) => {
                warn!(tx = %input.tx_id, %err, "atomic tx info lookup failed, using fallback coords");
                None
            }
        });

    let update = match resolved {
        Some(info) => UtxoUpdate {
            created_on_chain: Some(*source_chain),
            block_number: Some(info.block_number),
            block_timestamp: Some(info.block_timestamp),
            ..Default::default()
        },
        None => UtxoUpdate {
            created_on_chain: Some(*source_chain),
            block_number: coords.block_number,
            block_timestamp: Some(coords.timestamp),
            creation_is_fallback: true,
            ..Default::default()
        },
    };

    for partition in partitions {
        batch.upsert(*partition, &id, update.clone())?;
    }

    Ok(())
}

/// Read-your-writes helper used in tests and by the query layer: a record is
/// the committed one; `None` means untouched id.
pub fn lookup<S: UtxoStore>(
    store: &S,
    chain: ChainTag,
    id: &UtxoId,
) -> Result<Option<(StoredUtxo, Option<SpendInfo>)>, IndexError> {
    let Some(utxo) = store.get_utxo(chain, id)? else {
        return Ok(None);
    };

    let spend = store.get_spend(chain, id)?;
    Ok(Some((utxo, spend)))
}

pub(crate) fn stake_update_extras(
    update: &mut UtxoUpdate,
    node_id: &str,
    start: UnixTime,
    end: UnixTime,
    reward_addresses: &[String],
) {
    update.kind = Some(UtxoKind::Stake);
    update.staked = Some(true);
    update.stake_start = Some(start);
    update.stake_end = Some(end);
    update.node_id = Some(node_id.to_string());
    update.reward_addresses = Some(reward_addresses.to_vec());
}

pub(crate) fn utxo_id_of(tx_id: &TxId, index: u32) -> Id32 {
    Id32::for_output(tx_id, index)
}

pub(crate) fn credential_list(
    unsigned: &[u8],
    signatures: &[crate::model::RawSignature],
) -> Option<Vec<Credential>> {
    if signatures.is_empty() {
        return None;
    }

    Some(crate::utxo::contract::recover_credentials(unsigned, signatures))
}
