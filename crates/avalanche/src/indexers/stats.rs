//! Network stats snapshot: polled by a background monitor, published through
//! a single-producer channel, persisted on each successful poll.

use serde::{Deserialize, Serialize};

use serac_core::{IndexError, KvBucket, UnixTime};

use super::codec_err;

pub const POLL_INTERVAL_SECS: u64 = 30;
pub const ERROR_POLL_INTERVAL_SECS: u64 = 5;

const SNAPSHOT_KEY: &[u8] = b"snapshot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub taken_at: UnixTime,
    pub validator_count: u64,
    pub total_stake: u64,
    pub peer_count: u64,
    pub supply: u64,
}

pub fn load_snapshot<B: KvBucket>(bucket: &B) -> Result<Option<StatsSnapshot>, IndexError> {
    let Some(raw) = bucket.get(SNAPSHOT_KEY)? else {
        return Ok(None);
    };
    Ok(Some(bincode::deserialize(&raw).map_err(codec_err)?))
}

pub fn store_snapshot<B: KvBucket>(bucket: &B, snapshot: &StatsSnapshot) -> Result<(), IndexError> {
    let encoded = bincode::serialize(snapshot).map_err(codec_err)?;
    bucket.write(&[(SNAPSHOT_KEY.to_vec(), Some(encoded))])?;
    Ok(())
}
