//! Store traits implemented by the storage crate.
//!
//! All writes go through atomic batches. A batch that advances a watermark
//! must carry the state mutations that consumed those inputs; partially
//! filled batches are dropped, never committed.

use crate::{
    ids::{AssetId, UtxoId},
    model::{AssetInfo, SpendInfo, StoredUtxo, UtxoUpdate},
    BlockHeight, ChainTag, RawPayload, StoreError, TxIndex,
};

/// Chain-scoped KV of raw block payloads, keyed by big-endian height.
pub trait BlockStore: Clone + Send + Sync + 'static {
    /// The `latest` marker. Never exceeds any present block: payloads and the
    /// marker commit in one batch.
    fn latest(&self) -> Result<Option<BlockHeight>, StoreError>;

    fn get(&self, height: BlockHeight) -> Result<Option<RawPayload>, StoreError>;

    fn put_batch(
        &self,
        blocks: &[(BlockHeight, RawPayload)],
        new_latest: BlockHeight,
    ) -> Result<(), StoreError>;
}

/// Sequential tx entries for the pre-Cortina X-chain era (no linear blocks).
pub trait TxLogStore: Clone + Send + Sync + 'static {
    fn latest_tx(&self) -> Result<Option<TxIndex>, StoreError>;

    fn get_tx(&self, index: TxIndex) -> Result<Option<RawPayload>, StoreError>;

    fn put_tx_batch(
        &self,
        txs: &[(TxIndex, RawPayload)],
        new_latest: TxIndex,
    ) -> Result<(), StoreError>;
}

/// Watermark cells owned by the UTXO indexing engine, one per runner stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageWatermark {
    Platform,
    ExchangePreCortina,
    ExchangeBlocks,
    Contract,
}

impl StageWatermark {
    pub fn key(&self) -> &'static [u8] {
        match self {
            StageWatermark::Platform => b"p_watermark",
            StageWatermark::ExchangePreCortina => b"x_pre_cortina_watermark",
            StageWatermark::ExchangeBlocks => b"x_block_watermark",
            StageWatermark::Contract => b"c_watermark",
        }
    }
}

/// The chain-partitioned UTXO store plus the shared spend and address
/// indexes. Reads see committed state only; in-progress batch writes are
/// visible through the batch's own pending map.
pub trait UtxoStore: Clone + Send + Sync + 'static {
    type Batch: UtxoBatch;

    fn start_batch(&self) -> Result<Self::Batch, StoreError>;

    fn get_utxo(&self, chain: ChainTag, id: &UtxoId) -> Result<Option<StoredUtxo>, StoreError>;

    fn get_spend(&self, chain: ChainTag, id: &UtxoId) -> Result<Option<SpendInfo>, StoreError>;

    /// Candidate set for one address, from the prefix-scan index.
    fn by_address(&self, chain: ChainTag, address: &str) -> Result<Vec<UtxoId>, StoreError>;

    fn get_asset(&self, id: &AssetId) -> Result<Option<AssetInfo>, StoreError>;

    fn watermark(&self, stage: StageWatermark) -> Result<Option<BlockHeight>, StoreError>;
}

/// An atomic write batch over the UTXO store.
///
/// `upsert` reads any existing record first from this batch's pending map,
/// else from committed state, merges non-null fields, and stages the result.
/// The KV engine does not honor read-your-writes inside a batch; the pending
/// map is what makes a tx able to consume its own earlier outputs.
pub trait UtxoBatch {
    fn upsert(
        &mut self,
        chain: ChainTag,
        id: &UtxoId,
        update: UtxoUpdate,
    ) -> Result<(), StoreError>;

    fn mark_spent(
        &mut self,
        chain: ChainTag,
        id: &UtxoId,
        info: &SpendInfo,
    ) -> Result<(), StoreError>;

    fn index_address(
        &mut self,
        chain: ChainTag,
        address: &str,
        id: &UtxoId,
    ) -> Result<(), StoreError>;

    fn put_asset(&mut self, info: &AssetInfo) -> Result<(), StoreError>;

    fn set_watermark(&mut self, stage: StageWatermark, value: u64) -> Result<(), StoreError>;

    fn commit(self) -> Result<(), StoreError>;
}

/// Namespaces for the small domain indexers. Each owns its own watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKind {
    Validators,
    Subnets,
    Blockchains,
    Rewards,
    ChainList,
    NetworkStats,
}

impl BucketKind {
    pub const ALL: [BucketKind; 6] = [
        BucketKind::Validators,
        BucketKind::Subnets,
        BucketKind::Blockchains,
        BucketKind::Rewards,
        BucketKind::ChainList,
        BucketKind::NetworkStats,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            BucketKind::Validators => "validators",
            BucketKind::Subnets => "subnets",
            BucketKind::Blockchains => "blockchains",
            BucketKind::Rewards => "rewards",
            BucketKind::ChainList => "chain_list",
            BucketKind::NetworkStats => "network_stats",
        }
    }
}

/// Write op for a bucket batch: `None` deletes the key.
pub type BucketWrite = (Vec<u8>, Option<Vec<u8>>);

/// A plain ordered KV namespace with prefix scans and atomic batches.
pub trait KvBucket: Clone + Send + Sync + 'static {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    fn write(&self, entries: &[BucketWrite]) -> Result<(), StoreError>;
}

pub const BUCKET_WATERMARK_KEY: &[u8] = b"_watermark";

/// Read a bucket's big-endian u64 watermark cell.
pub fn bucket_watermark<B: KvBucket>(bucket: &B) -> Result<Option<BlockHeight>, StoreError> {
    let Some(raw) = bucket.get(BUCKET_WATERMARK_KEY)? else {
        return Ok(None);
    };

    let bytes: [u8; 8] = raw
        .as_slice()
        .try_into()
        .map_err(|_| StoreError::Codec("watermark cell is not 8 bytes".into()))?;

    Ok(Some(u64::from_be_bytes(bytes)))
}

pub fn watermark_write(value: BlockHeight) -> BucketWrite {
    (BUCKET_WATERMARK_KEY.to_vec(), Some(value.to_be_bytes().to_vec()))
}

/// Forever-cache for immutable RPC responses.
pub trait RpcCache: Clone + Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

pub const REWARD_CACHE_PREFIX: &str = "reward:";
pub const ATOMIC_SOURCE_CACHE_PREFIX: &str = "atomic:source:";
