//! In-memory UtxoStore used by the engine tests. Mirrors the storage
//! crate's batch semantics: reads see committed state only, upserts read
//! through the batch's own pending map first.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use serac_core::{
    AssetId, AssetInfo, ChainTag, SpendInfo, StageWatermark, StoreError, StoredUtxo, UtxoBatch,
    UtxoId, UtxoStore, UtxoUpdate,
};

type Key = (u8, UtxoId);

#[derive(Default)]
struct Inner {
    utxos: BTreeMap<Key, StoredUtxo>,
    spends: BTreeMap<Key, SpendInfo>,
    addresses: BTreeSet<(u8, String, UtxoId)>,
    assets: BTreeMap<AssetId, AssetInfo>,
    watermarks: BTreeMap<Vec<u8>, u64>,
}

#[derive(Clone, Default)]
pub struct MemUtxoStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemUtxoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UtxoStore for MemUtxoStore {
    type Batch = MemBatch;

    fn start_batch(&self) -> Result<Self::Batch, StoreError> {
        Ok(MemBatch {
            inner: self.inner.clone(),
            utxos: BTreeMap::new(),
            spends: Vec::new(),
            addresses: Vec::new(),
            assets: Vec::new(),
            watermarks: Vec::new(),
        })
    }

    fn get_utxo(&self, chain: ChainTag, id: &UtxoId) -> Result<Option<StoredUtxo>, StoreError> {
        let inner = self.inner.lock().map_err(|e| StoreError::engine(e))?;
        Ok(inner.utxos.get(&(chain.prefix(), *id)).cloned())
    }

    fn get_spend(&self, chain: ChainTag, id: &UtxoId) -> Result<Option<SpendInfo>, StoreError> {
        let inner = self.inner.lock().map_err(|e| StoreError::engine(e))?;
        Ok(inner.spends.get(&(chain.prefix(), *id)).cloned())
    }

    fn by_address(&self, chain: ChainTag, address: &str) -> Result<Vec<UtxoId>, StoreError> {
        let inner = self.inner.lock().map_err(|e| StoreError::engine(e))?;
        Ok(inner
            .addresses
            .iter()
            .filter(|(prefix, owned, _)| *prefix == chain.prefix() && owned == address)
            .map(|(_, _, id)| *id)
            .collect())
    }

    fn get_asset(&self, id: &AssetId) -> Result<Option<AssetInfo>, StoreError> {
        let inner = self.inner.lock().map_err(|e| StoreError::engine(e))?;
        Ok(inner.assets.get(id).cloned())
    }

    fn watermark(&self, stage: StageWatermark) -> Result<Option<u64>, StoreError> {
        let inner = self.inner.lock().map_err(|e| StoreError::engine(e))?;
        Ok(inner.watermarks.get(stage.key()).copied())
    }
}

pub struct MemBatch {
    inner: Arc<Mutex<Inner>>,
    utxos: BTreeMap<Key, StoredUtxo>,
    spends: Vec<(Key, SpendInfo)>,
    addresses: Vec<(u8, String, UtxoId)>,
    assets: Vec<AssetInfo>,
    watermarks: Vec<(StageWatermark, u64)>,
}

impl UtxoBatch for MemBatch {
    fn upsert(
        &mut self,
        chain: ChainTag,
        id: &UtxoId,
        update: UtxoUpdate,
    ) -> Result<(), StoreError> {
        let key = (chain.prefix(), *id);

        let mut record = match self.utxos.get(&key) {
            Some(pending) => pending.clone(),
            None => {
                let inner = self.inner.lock().map_err(|e| StoreError::engine(e))?;
                inner
                    .utxos
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| StoredUtxo::new(*id))
            }
        };

        record.merge(update);
        self.utxos.insert(key, record);
        Ok(())
    }

    fn mark_spent(
        &mut self,
        chain: ChainTag,
        id: &UtxoId,
        info: &SpendInfo,
    ) -> Result<(), StoreError> {
        self.spends.push(((chain.prefix(), *id), info.clone()));
        Ok(())
    }

    fn index_address(
        &mut self,
        chain: ChainTag,
        address: &str,
        id: &UtxoId,
    ) -> Result<(), StoreError> {
        self.addresses.push((chain.prefix(), address.to_string(), *id));
        Ok(())
    }

    fn put_asset(&mut self, info: &AssetInfo) -> Result<(), StoreError> {
        self.assets.push(info.clone());
        Ok(())
    }

    fn set_watermark(&mut self, stage: StageWatermark, value: u64) -> Result<(), StoreError> {
        self.watermarks.push((stage, value));
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|e| StoreError::engine(e))?;

        for (key, record) in self.utxos {
            inner.utxos.insert(key, record);
        }
        for (key, info) in self.spends {
            inner.spends.insert(key, info);
        }
        for entry in self.addresses {
            inner.addresses.insert(entry);
        }
        for asset in self.assets {
            inner.assets.insert(asset.asset_id, asset);
        }
        for (stage, value) in self.watermarks {
            inner.watermarks.insert(stage.key().to_vec(), value);
        }

        Ok(())
    }
}
