//! The concrete domain wiring: fjall stores opened under the configured
//! data directory, laid out per chain and per indexer.

use std::path::PathBuf;

use serac_avalanche::AVAX_DENOMINATION;
use serac_core::{
    AssetInfo, BucketKind, ChainTag, Domain, NetworkParams, StorageConfig, UtxoBatch as _,
    UtxoStore as _,
};

use crate::prelude::Error;

#[derive(Clone)]
pub struct DomainAdapter {
    p_blocks: serac_fjall::BlockStore,
    x_blocks: serac_fjall::BlockStore,
    c_blocks: serac_fjall::BlockStore,
    utxos: serac_fjall::UtxoStore,
    validators: serac_fjall::Bucket,
    subnets: serac_fjall::Bucket,
    blockchains: serac_fjall::Bucket,
    rewards: serac_fjall::Bucket,
    chain_list: serac_fjall::Bucket,
    network_stats: serac_fjall::Bucket,
    rpc_cache: serac_fjall::RpcCache,
    params: NetworkParams,
}

impl DomainAdapter {
    pub fn open(storage: &StorageConfig, params: NetworkParams) -> Result<Self, Error> {
        let root: PathBuf = storage.path.join(params.network_id.to_string());

        std::fs::create_dir_all(root.join("blocks")).map_err(Error::storage)?;

        let cache_mb = storage.cache;

        let open_blocks = |chain: ChainTag| {
            serac_fjall::BlockStore::open(root.join("blocks").join(chain.dir_name()), cache_mb)
                .map_err(Error::storage)
        };

        let open_bucket = |kind: BucketKind| {
            serac_fjall::Bucket::open(root.join(kind.dir_name()), cache_mb).map_err(Error::storage)
        };

        let utxos =
            serac_fjall::UtxoStore::open(root.join("utxos"), cache_mb).map_err(Error::storage)?;

        seed_native_asset(&utxos, &params)?;

        Ok(Self {
            p_blocks: open_blocks(ChainTag::Platform)?,
            x_blocks: open_blocks(ChainTag::Exchange)?,
            c_blocks: open_blocks(ChainTag::Contract)?,
            utxos,
            validators: open_bucket(BucketKind::Validators)?,
            subnets: open_bucket(BucketKind::Subnets)?,
            blockchains: open_bucket(BucketKind::Blockchains)?,
            rewards: open_bucket(BucketKind::Rewards)?,
            chain_list: open_bucket(BucketKind::ChainList)?,
            network_stats: open_bucket(BucketKind::NetworkStats)?,
            rpc_cache: serac_fjall::RpcCache::open(root.join("rpc_cache"), cache_mb)
                .map_err(Error::storage)?,
            params,
        })
    }
}

/// The native asset never appears in a `CreateAsset` tx; its registry entry
/// is a constant.
fn seed_native_asset(utxos: &serac_fjall::UtxoStore, params: &NetworkParams) -> Result<(), Error> {
    if utxos.get_asset(&params.avax_asset_id)?.is_some() {
        return Ok(());
    }

    let mut batch = utxos.start_batch()?;
    batch.put_asset(&AssetInfo {
        asset_id: params.avax_asset_id,
        name: "Avalanche".into(),
        symbol: "AVAX".into(),
        denomination: AVAX_DENOMINATION,
    })?;
    batch.commit()?;

    Ok(())
}

impl Domain for DomainAdapter {
    type Blocks = serac_fjall::BlockStore;
    type TxLog = serac_fjall::BlockStore;
    type Utxos = serac_fjall::UtxoStore;
    type Bucket = serac_fjall::Bucket;
    type Cache = serac_fjall::RpcCache;

    fn blocks(&self, chain: ChainTag) -> &Self::Blocks {
        match chain {
            ChainTag::Platform => &self.p_blocks,
            ChainTag::Exchange => &self.x_blocks,
            ChainTag::Contract => &self.c_blocks,
        }
    }

    fn x_tx_log(&self) -> &Self::TxLog {
        &self.x_blocks
    }

    fn utxos(&self) -> &Self::Utxos {
        &self.utxos
    }

    fn bucket(&self, name: BucketKind) -> &Self::Bucket {
        match name {
            BucketKind::Validators => &self.validators,
            BucketKind::Subnets => &self.subnets,
            BucketKind::Blockchains => &self.blockchains,
            BucketKind::Rewards => &self.rewards,
            BucketKind::ChainList => &self.chain_list,
            BucketKind::NetworkStats => &self.network_stats,
        }
    }

    fn rpc_cache(&self) -> &Self::Cache {
        &self.rpc_cache
    }

    fn params(&self) -> &NetworkParams {
        &self.params
    }
}
