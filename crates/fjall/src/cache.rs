//! Forever-cache for immutable RPC responses. Entries never expire and are
//! never invalidated; the cached data is immutable chain history.

use std::path::Path;
use std::sync::Arc;

use fjall::{Database, Keyspace, PersistMode};

use serac_core::StoreError;

use crate::{open_database, open_keyspace, Error};

#[derive(Clone)]
pub struct RpcCache {
    db: Arc<Database>,
    cache: Keyspace,
}

impl RpcCache {
    pub fn open(path: impl AsRef<Path>, cache_mb: Option<usize>) -> Result<Self, Error> {
        let db = Arc::new(open_database(path.as_ref(), cache_mb)?);
        let cache = open_keyspace(&db, "cache")?;

        Ok(Self { db, cache })
    }
}

impl serac_core::RpcCache for RpcCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self
            .cache
            .get(key.as_bytes())
            .map_err(Error::from)?
            .map(|v| v.as_ref().to_vec());

        Ok(value)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut batch = self.db.batch();
        batch.insert(&self.cache, key.as_bytes(), value);

        // cached responses can be refetched; buffered durability is enough
        let batch = batch.durability(Some(PersistMode::Buffer));
        batch.commit().map_err(|e| Error::Fjall(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serac_core::RpcCache as _;

    #[test]
    fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RpcCache::open(dir.path().join("rpc_cache"), None).unwrap();

        assert_eq!(cache.get("reward:abc").unwrap(), None);

        cache.put("reward:abc", b"payload").unwrap();
        assert_eq!(cache.get("reward:abc").unwrap(), Some(b"payload".to_vec()));

        cache.put("atomic:source:xyz", b"coords").unwrap();
        assert_eq!(
            cache.get("atomic:source:xyz").unwrap(),
            Some(b"coords".to_vec())
        );
    }
}
