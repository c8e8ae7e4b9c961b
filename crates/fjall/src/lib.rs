//! Fjall-based storage for serac.
//!
//! Each storage area is its own database directory so raw block storage
//! stays separable from indexed state:
//!
//! ```text
//! data/{network_id}/blocks/{p|x|c}/   raw payloads + latest marker
//! data/{network_id}/utxos/            records, spend index, address index
//! data/{network_id}/rpc_cache/        forever-cached RPC responses
//! data/{network_id}/{indexer}/        one bucket per domain indexer
//! ```
//!
//! All multi-byte integers in keys are big-endian for correct lexicographic
//! ordering. Batches commit with sync durability: a committed watermark
//! implies every write that preceded it in the batch.

use std::path::Path;

use fjall::{Database, Keyspace, KeyspaceCreateOptions};

use serac_core::StoreError;

pub mod blocks;
pub mod bucket;
pub mod cache;
pub mod keys;
pub mod utxo;

pub use blocks::BlockStore;
pub use bucket::Bucket;
pub use cache::RpcCache;
pub use utxo::UtxoStore;

/// Default cache size in MB per database
const DEFAULT_CACHE_SIZE_MB: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("lock poisoned")]
    LockPoisoned,
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        match error {
            Error::Codec(x) => StoreError::Codec(x),
            other => StoreError::Engine(other.to_string()),
        }
    }
}

pub(crate) fn open_database(path: &Path, cache_mb: Option<usize>) -> Result<Database, Error> {
    let cache_bytes = (cache_mb.unwrap_or(DEFAULT_CACHE_SIZE_MB) * 1024 * 1024) as u64;

    let db = Database::builder(path).cache_size(cache_bytes).open()?;

    Ok(db)
}

pub(crate) fn open_keyspace(db: &Database, name: &str) -> Result<Keyspace, Error> {
    let keyspace = db.keyspace(name, KeyspaceCreateOptions::default)?;
    Ok(keyspace)
}
