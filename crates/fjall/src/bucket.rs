//! A plain KV namespace for the small domain indexers.

use std::path::Path;
use std::sync::Arc;

use fjall::{Database, Keyspace, PersistMode};

use serac_core::{BucketWrite, StoreError};

use crate::{open_database, open_keyspace, Error};

#[derive(Clone)]
pub struct Bucket {
    db: Arc<Database>,
    kv: Keyspace,
}

impl Bucket {
    pub fn open(path: impl AsRef<Path>, cache_mb: Option<usize>) -> Result<Self, Error> {
        let db = Arc::new(open_database(path.as_ref(), cache_mb)?);
        let kv = open_keyspace(&db, "kv")?;

        Ok(Self { db, kv })
    }
}

impl serac_core::KvBucket for Bucket {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self
            .kv
            .get(key)
            .map_err(Error::from)?
            .map(|v| v.as_ref().to_vec());

        Ok(value)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut out = Vec::new();

        for guard in self.kv.prefix(prefix) {
            let (key, value) = guard.into_inner().map_err(|e| Error::Fjall(e.into()))?;
            out.push((key.as_ref().to_vec(), value.as_ref().to_vec()));
        }

        Ok(out)
    }

    fn write(&self, entries: &[BucketWrite]) -> Result<(), StoreError> {
        let mut batch = self.db.batch();

        for (key, value) in entries {
            match value {
                Some(value) => batch.insert(&self.kv, key.as_slice(), value.as_slice()),
                None => batch.remove(&self.kv, key.as_slice()),
            }
        }

        let batch = batch.durability(Some(PersistMode::SyncAll));
        batch.commit().map_err(|e| Error::Fjall(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serac_core::{bucket_watermark, watermark_write, KvBucket as _};

    fn bucket() -> (tempfile::TempDir, Bucket) {
        let dir = tempfile::tempdir().unwrap();
        let bucket = Bucket::open(dir.path().join("validators"), None).unwrap();
        (dir, bucket)
    }

    #[test]
    fn write_then_read_and_scan() {
        let (_dir, bucket) = bucket();

        bucket
            .write(&[
                (b"s:aaa".to_vec(), Some(b"1".to_vec())),
                (b"s:aab".to_vec(), Some(b"2".to_vec())),
                (b"t:zzz".to_vec(), Some(b"3".to_vec())),
            ])
            .unwrap();

        assert_eq!(bucket.get(b"s:aaa").unwrap(), Some(b"1".to_vec()));

        let hits = bucket.scan_prefix(b"s:").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, b"s:aaa".to_vec());

        bucket.write(&[(b"s:aaa".to_vec(), None)]).unwrap();
        assert_eq!(bucket.get(b"s:aaa").unwrap(), None);
    }

    #[test]
    fn watermark_helpers_roundtrip() {
        let (_dir, bucket) = bucket();

        assert_eq!(bucket_watermark(&bucket).unwrap(), None);

        bucket.write(&[watermark_write(77)]).unwrap();
        assert_eq!(bucket_watermark(&bucket).unwrap(), Some(77));
    }
}
