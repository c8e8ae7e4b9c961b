//! The UTXO store: chain-partitioned records, the shared spend index, the
//! address index and the engine's stage watermarks, all in one database so
//! a batch spanning them is atomic.
//!
//! The write batch keeps its own pending-record map: fjall batches do not
//! honor reads of uncommitted writes, and a tx may consume an output created
//! earlier in the same batch.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use fjall::{Database, Keyspace, OwnedWriteBatch, PersistMode};

use serac_core::{
    AssetId, AssetInfo, BlockHeight, ChainTag, SpendInfo, StageWatermark, StoreError, StoredUtxo,
    UtxoId, UtxoUpdate,
};

use crate::keys::{address_key, address_prefix, utxo_id_from_suffix, utxo_key};
use crate::{open_database, open_keyspace, Error};

#[derive(Clone)]
pub struct UtxoStore {
    db: Arc<Database>,
    utxos: Keyspace,
    spent: Keyspace,
    addresses: Keyspace,
    assets: Keyspace,
    watermarks: Keyspace,
}

impl UtxoStore {
    pub fn open(path: impl AsRef<Path>, cache_mb: Option<usize>) -> Result<Self, Error> {
        let db = Arc::new(open_database(path.as_ref(), cache_mb)?);

        let utxos = open_keyspace(&db, "utxos")?;
        let spent = open_keyspace(&db, "spent")?;
        let addresses = open_keyspace(&db, "addresses")?;
        let assets = open_keyspace(&db, "assets")?;
        let watermarks = open_keyspace(&db, "watermarks")?;

        Ok(Self {
            db,
            utxos,
            spent,
            addresses,
            assets,
            watermarks,
        })
    }

    fn read_utxo(&self, key: &[u8]) -> Result<Option<StoredUtxo>, StoreError> {
        let Some(raw) = self.utxos.get(key).map_err(Error::from)? else {
            return Ok(None);
        };

        let record = bincode::deserialize(raw.as_ref())
            .map_err(|e| StoreError::Codec(e.to_string()))?;

        Ok(Some(record))
    }
}

impl serac_core::UtxoStore for UtxoStore {
    type Batch = UtxoWriteBatch;

    fn start_batch(&self) -> Result<Self::Batch, StoreError> {
        Ok(UtxoWriteBatch {
            batch: self.db.batch(),
            store: self.clone(),
            pending: HashMap::new(),
        })
    }

    fn get_utxo(&self, chain: ChainTag, id: &UtxoId) -> Result<Option<StoredUtxo>, StoreError> {
        self.read_utxo(&utxo_key(chain, id))
    }

    fn get_spend(&self, chain: ChainTag, id: &UtxoId) -> Result<Option<SpendInfo>, StoreError> {
        let Some(raw) = self.spent.get(utxo_key(chain, id)).map_err(Error::from)? else {
            return Ok(None);
        };

        // a spend-index row that cannot decode is corrupt state, not a miss
        let info = bincode::deserialize(raw.as_ref())
            .map_err(|e| StoreError::Codec(e.to_string()))?;

        Ok(Some(info))
    }

    fn by_address(&self, chain: ChainTag, address: &str) -> Result<Vec<UtxoId>, StoreError> {
        let prefix = address_prefix(chain, address);
        let mut out = Vec::new();

        for guard in self.addresses.prefix(&prefix) {
            let key = guard.key().map_err(|e| Error::Fjall(e.into()))?;

            if let Some(id) = utxo_id_from_suffix(key.as_ref(), prefix.len()) {
                out.push(id);
            }
        }

        Ok(out)
    }

    fn get_asset(&self, id: &AssetId) -> Result<Option<AssetInfo>, StoreError> {
        let Some(raw) = self.assets.get(id.as_bytes()).map_err(Error::from)? else {
            return Ok(None);
        };

        let info = bincode::deserialize(raw.as_ref())
            .map_err(|e| StoreError::Codec(e.to_string()))?;

        Ok(Some(info))
    }

    fn watermark(&self, stage: StageWatermark) -> Result<Option<BlockHeight>, StoreError> {
        let Some(raw) = self.watermarks.get(stage.key()).map_err(Error::from)? else {
            return Ok(None);
        };

        let bytes: [u8; 8] = raw
            .as_ref()
            .try_into()
            .map_err(|_| StoreError::Codec("watermark cell is not 8 bytes".into()))?;

        Ok(Some(u64::from_be_bytes(bytes)))
    }
}

pub struct UtxoWriteBatch {
    batch: OwnedWriteBatch,
    store: UtxoStore,
    pending: HashMap<Vec<u8>, StoredUtxo>,
}

impl serac_core::UtxoBatch for UtxoWriteBatch {
    fn upsert(
        &mut self,
        chain: ChainTag,
        id: &UtxoId,
        update: UtxoUpdate,
    ) -> Result<(), StoreError> {
        let key = utxo_key(chain, id);

        let mut record = match self.pending.get(&key) {
            Some(hit) => hit.clone(),
            None => self
                .store
                .read_utxo(&key)?
                .unwrap_or_else(|| StoredUtxo::new(*id)),
        };

        record.merge(update);

        let encoded =
            bincode::serialize(&record).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.batch.insert(&self.store.utxos, &key, encoded);

        self.pending.insert(key, record);
        Ok(())
    }

    fn mark_spent(
        &mut self,
        chain: ChainTag,
        id: &UtxoId,
        info: &SpendInfo,
    ) -> Result<(), StoreError> {
        let encoded = bincode::serialize(info).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.batch.insert(&self.store.spent, utxo_key(chain, id), encoded);
        Ok(())
    }

    fn index_address(
        &mut self,
        chain: ChainTag,
        address: &str,
        id: &UtxoId,
    ) -> Result<(), StoreError> {
        self.batch
            .insert(&self.store.addresses, address_key(chain, address, id), []);
        Ok(())
    }

    fn put_asset(&mut self, info: &AssetInfo) -> Result<(), StoreError> {
        let encoded = bincode::serialize(info).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.batch
            .insert(&self.store.assets, info.asset_id.as_bytes(), encoded);
        Ok(())
    }

    fn set_watermark(&mut self, stage: StageWatermark, value: u64) -> Result<(), StoreError> {
        self.batch
            .insert(&self.store.watermarks, stage.key(), value.to_be_bytes());
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        let batch = self.batch.durability(Some(PersistMode::SyncAll));
        batch.commit().map_err(|e| Error::Fjall(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serac_core::{UtxoBatch as _, UtxoStore as _};

    fn id(byte: u8) -> UtxoId {
        UtxoId::from([byte; 32])
    }

    fn store() -> (tempfile::TempDir, UtxoStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = UtxoStore::open(dir.path().join("utxos"), None).unwrap();
        (dir, store)
    }

    fn amount_update(amount: &str) -> UtxoUpdate {
        UtxoUpdate {
            amount: Some(amount.into()),
            addresses: Some(vec!["P-avax1zzz".into()]),
            threshold: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn upsert_merges_into_committed_state() {
        let (_dir, store) = store();

        let mut batch = store.start_batch().unwrap();
        batch.upsert(ChainTag::Platform, &id(1), amount_update("100")).unwrap();
        batch.commit().unwrap();

        let mut batch = store.start_batch().unwrap();
        batch
            .upsert(
                ChainTag::Platform,
                &id(1),
                UtxoUpdate {
                    block_number: Some(42),
                    ..Default::default()
                },
            )
            .unwrap();
        batch.commit().unwrap();

        let record = store.get_utxo(ChainTag::Platform, &id(1)).unwrap().unwrap();
        assert_eq!(record.amount.as_deref(), Some("100"));
        assert_eq!(record.block_number, Some(42));
    }

    #[test]
    fn upsert_reads_its_own_batch() {
        let (_dir, store) = store();

        let mut batch = store.start_batch().unwrap();
        batch.upsert(ChainTag::Exchange, &id(2), amount_update("7")).unwrap();
        batch
            .upsert(
                ChainTag::Exchange,
                &id(2),
                UtxoUpdate {
                    block_timestamp: Some(99),
                    ..Default::default()
                },
            )
            .unwrap();
        batch.commit().unwrap();

        let record = store.get_utxo(ChainTag::Exchange, &id(2)).unwrap().unwrap();
        assert_eq!(record.amount.as_deref(), Some("7"));
        assert_eq!(record.block_timestamp, Some(99));
    }

    #[test]
    fn partitions_are_isolated() {
        let (_dir, store) = store();

        let mut batch = store.start_batch().unwrap();
        batch.upsert(ChainTag::Platform, &id(3), amount_update("1")).unwrap();
        batch.commit().unwrap();

        assert!(store.get_utxo(ChainTag::Platform, &id(3)).unwrap().is_some());
        assert!(store.get_utxo(ChainTag::Contract, &id(3)).unwrap().is_none());
    }

    #[test]
    fn address_index_prefix_scan() {
        let (_dir, store) = store();

        let mut batch = store.start_batch().unwrap();
        batch.index_address(ChainTag::Platform, "P-avax1one", &id(4)).unwrap();
        batch.index_address(ChainTag::Platform, "P-avax1one", &id(5)).unwrap();
        batch.index_address(ChainTag::Platform, "P-avax1two", &id(6)).unwrap();
        batch.commit().unwrap();

        let mut hits = store.by_address(ChainTag::Platform, "P-avax1one").unwrap();
        hits.sort();
        assert_eq!(hits, vec![id(4), id(5)]);

        assert!(store.by_address(ChainTag::Exchange, "P-avax1one").unwrap().is_empty());
    }

    #[test]
    fn spend_index_roundtrip() {
        let (_dir, store) = store();

        let info = SpendInfo {
            consuming_tx: id(9),
            consuming_time: 123,
            consuming_block_number: 7,
            consumed_on_chain: id(0),
            credentials: None,
        };

        let mut batch = store.start_batch().unwrap();
        batch.mark_spent(ChainTag::Contract, &id(8), &info).unwrap();
        batch.commit().unwrap();

        let loaded = store.get_spend(ChainTag::Contract, &id(8)).unwrap().unwrap();
        assert_eq!(loaded, info);
        assert!(store.get_spend(ChainTag::Platform, &id(8)).unwrap().is_none());
    }

    #[test]
    fn watermark_cells_are_per_stage() {
        let (_dir, store) = store();

        let mut batch = store.start_batch().unwrap();
        batch.set_watermark(StageWatermark::Platform, 10).unwrap();
        batch.set_watermark(StageWatermark::Contract, 20).unwrap();
        batch.commit().unwrap();

        assert_eq!(store.watermark(StageWatermark::Platform).unwrap(), Some(10));
        assert_eq!(store.watermark(StageWatermark::Contract).unwrap(), Some(20));
        assert_eq!(store.watermark(StageWatermark::ExchangeBlocks).unwrap(), None);
    }
}
