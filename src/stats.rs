//! Network stats monitor: a single publisher polling the node, readers see
//! either the previous or the new snapshot in full (freshness ≤ 30 s in
//! steady state).

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use serac_avalanche::indexers::{
    load_snapshot, store_snapshot, StatsSnapshot, ERROR_POLL_INTERVAL_SECS, POLL_INTERVAL_SECS,
};
use serac_avalanche::rpc::{NodeClient, PlatformRpc};
use serac_core::KvBucket;

use crate::prelude::CancellationToken;

pub fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

async fn poll(rpc: &NodeClient) -> Result<StatsSnapshot, serac_core::RpcError> {
    let validators = PlatformRpc::current_validators(rpc).await?;
    let peer_count = PlatformRpc::peer_count(rpc).await?;
    let supply = PlatformRpc::current_supply(rpc).await?;

    Ok(StatsSnapshot {
        taken_at: now_unix(),
        validator_count: validators.len() as u64,
        total_stake: validators.iter().map(|v| v.weight).sum(),
        peer_count,
        supply,
    })
}

/// Spawn the monitor; the receiver starts with the last persisted snapshot
/// so restarts serve stale-but-real data immediately.
pub fn spawn_monitor<B: KvBucket>(
    rpc: NodeClient,
    bucket: B,
    cancel: CancellationToken,
) -> watch::Receiver<Option<StatsSnapshot>> {
    let initial = load_snapshot(&bucket).ok().flatten();

    let (tx, rx) = watch::channel(initial);

    tokio::spawn(async move {
        loop {
            let interval = match poll(&rpc).await {
                Ok(snapshot) => {
                    if let Err(err) = store_snapshot(&bucket, &snapshot) {
                        warn!(%err, "failed to persist stats snapshot");
                    }

                    tx.send_replace(Some(snapshot));
                    Duration::from_secs(POLL_INTERVAL_SECS)
                }
                Err(err) => {
                    warn!(%err, "stats poll failed");
                    Duration::from_secs(ERROR_POLL_INTERVAL_SECS)
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("stats monitor stopped");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    });

    rx
}
