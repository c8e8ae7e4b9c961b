//! Chain-scoped block store: raw payloads keyed by big-endian height plus a
//! `latest` marker committed in the same batch. The X-chain additionally
//! keeps `tx:{index}` entries for the pre-Cortina sequential log.

use std::path::Path;
use std::sync::Arc;

use fjall::{Database, Keyspace, PersistMode};

use serac_core::{BlockHeight, RawPayload, StoreError, TxIndex};

use crate::keys::{height_key, tx_index_key};
use crate::{open_database, open_keyspace, Error};

const LATEST_KEY: &[u8] = b"latest";
const LATEST_TX_KEY: &[u8] = b"latest_tx";

#[derive(Clone)]
pub struct BlockStore {
    db: Arc<Database>,
    blocks: Keyspace,
    meta: Keyspace,
}

impl BlockStore {
    pub fn open(path: impl AsRef<Path>, cache_mb: Option<usize>) -> Result<Self, Error> {
        let db = Arc::new(open_database(path.as_ref(), cache_mb)?);

        let blocks = open_keyspace(&db, "blocks")?;
        let meta = open_keyspace(&db, "meta")?;

        Ok(Self { db, blocks, meta })
    }

    fn read_marker(&self, key: &[u8]) -> Result<Option<u64>, StoreError> {
        let Some(raw) = self.meta.get(key).map_err(Error::from)? else {
            return Ok(None);
        };

        let bytes: [u8; 8] = raw
            .as_ref()
            .try_into()
            .map_err(|_| StoreError::Codec("marker cell is not 8 bytes".into()))?;

        Ok(Some(u64::from_be_bytes(bytes)))
    }
}

impl serac_core::BlockStore for BlockStore {
    fn latest(&self) -> Result<Option<BlockHeight>, StoreError> {
        self.read_marker(LATEST_KEY)
    }

    fn get(&self, height: BlockHeight) -> Result<Option<RawPayload>, StoreError> {
        let value = self
            .blocks
            .get(height_key(height))
            .map_err(Error::from)?
            .map(|v| v.as_ref().to_vec());

        Ok(value)
    }

    fn put_batch(
        &self,
        blocks: &[(BlockHeight, RawPayload)],
        new_latest: BlockHeight,
    ) -> Result<(), StoreError> {
        let mut batch = self.db.batch();

        for (height, payload) in blocks {
            batch.insert(&self.blocks, height_key(*height), payload.as_slice());
        }

        batch.insert(&self.meta, LATEST_KEY, new_latest.to_be_bytes());

        let batch = batch.durability(Some(PersistMode::SyncAll));
        batch.commit().map_err(|e| Error::Fjall(e).into())
    }
}

impl serac_core::TxLogStore for BlockStore {
    fn latest_tx(&self) -> Result<Option<TxIndex>, StoreError> {
        self.read_marker(LATEST_TX_KEY)
    }

    fn get_tx(&self, index: TxIndex) -> Result<Option<RawPayload>, StoreError> {
        let value = self
            .blocks
            .get(tx_index_key(index))
            .map_err(Error::from)?
            .map(|v| v.as_ref().to_vec());

        Ok(value)
    }

    fn put_tx_batch(
        &self,
        txs: &[(TxIndex, RawPayload)],
        new_latest: TxIndex,
    ) -> Result<(), StoreError> {
        let mut batch = self.db.batch();

        for (index, payload) in txs {
            batch.insert(&self.blocks, tx_index_key(*index), payload.as_slice());
        }

        batch.insert(&self.meta, LATEST_TX_KEY, new_latest.to_be_bytes());

        let batch = batch.durability(Some(PersistMode::SyncAll));
        batch.commit().map_err(|e| Error::Fjall(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serac_core::{BlockStore as _, TxLogStore as _};

    fn store() -> (tempfile::TempDir, BlockStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path().join("p"), None).unwrap();
        (dir, store)
    }

    #[test]
    fn empty_store_has_no_latest() {
        let (_dir, store) = store();
        assert_eq!(store.latest().unwrap(), None);
        assert_eq!(store.get(1).unwrap(), None);
    }

    #[test]
    fn batch_commits_payloads_with_marker() {
        let (_dir, store) = store();

        let blocks: Vec<_> = (1..=5u64).map(|h| (h, vec![h as u8; 16])).collect();
        store.put_batch(&blocks, 5).unwrap();

        assert_eq!(store.latest().unwrap(), Some(5));

        // no gaps below the marker
        for height in 1..=5 {
            assert_eq!(store.get(height).unwrap(), Some(vec![height as u8; 16]));
        }
        assert_eq!(store.get(6).unwrap(), None);
    }

    #[test]
    fn tx_log_is_independent_of_blocks() {
        let (_dir, store) = store();

        store.put_tx_batch(&[(0, b"tx0".to_vec()), (1, b"tx1".to_vec())], 1).unwrap();
        store.put_batch(&[(1, b"block1".to_vec())], 1).unwrap();

        assert_eq!(store.latest_tx().unwrap(), Some(1));
        assert_eq!(store.get_tx(0).unwrap(), Some(b"tx0".to_vec()));
        assert_eq!(store.get(1).unwrap(), Some(b"block1".to_vec()));
    }
}
