//! Fetchers: keep each chain's block store advancing toward the node head.
//!
//! Each iteration fetches a batch of heights in parallel and commits the
//! payloads together with the `latest` marker in one store batch, so the
//! marker never runs ahead of a missing block. Transient RPC failures back
//! off and retry; malformed responses halt the fetcher.

use std::time::Duration;

use futures_util::{stream, StreamExt as _, TryStreamExt as _};
use tracing::{debug, warn};

use serac_avalanche::{
    codec::{encode_c_payload, encode_p_payload, encode_x_block, encode_x_tx},
    model::PBlock,
    rpc::{CachedRpc, ContractRpc, ExchangeRpc, NodeClient, PlatformRpc},
};
use serac_core::{
    BlockHeight, BlockStore, RpcCache, RpcError, TxId, TxLogStore,
};

use crate::prelude::{CancellationToken, Error};

const HEAD_IDLE: Duration = Duration::from_secs(1);
const TRANSIENT_BACKOFF: Duration = Duration::from_secs(1);

const REWARD_FETCH_ATTEMPTS: usize = 3;
const REWARD_FETCH_DELAY: Duration = Duration::from_secs(2);

/// Decide the next contiguous range to fetch, refreshing the cached head
/// only when the local height is within one batch of it.
fn plan_range(
    next: BlockHeight,
    head: Option<BlockHeight>,
    batch: usize,
) -> (bool, Option<(BlockHeight, BlockHeight)>) {
    let refresh = match head {
        None => true,
        Some(head) => next + batch as u64 > head,
    };

    let range = head.filter(|head| next <= *head).map(|head| {
        let to = (next + batch as u64 - 1).min(head);
        (next, to)
    });

    (refresh, range)
}

async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn is_transient(error: &RpcError) -> bool {
    matches!(error, RpcError::Transport(_))
}

pub struct PlatformFetcher<S, C> {
    store: S,
    rpc: CachedRpc<NodeClient, C>,
    batch: usize,
}

impl<S: BlockStore, C: RpcCache> PlatformFetcher<S, C> {
    pub fn new(store: S, rpc: CachedRpc<NodeClient, C>, batch: usize) -> Self {
        Self { store, rpc, batch }
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<(), Error> {
        let mut head: Option<BlockHeight> = None;

        while !cancel.is_cancelled() {
            let next = self.store.latest()?.map(|l| l + 1).unwrap_or(0);
            let (refresh, _) = plan_range(next, head, self.batch);

            if refresh {
                match PlatformRpc::latest_height(self.rpc.inner()).await {
                    Ok(h) => head = Some(h),
                    Err(err) if is_transient(&err) => {
                        warn!(%err, "p-chain head refresh failed");
                        if !pause(&cancel, TRANSIENT_BACKOFF).await {
                            break;
                        }
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            let (_, range) = plan_range(next, head, self.batch);

            let Some((from, to)) = range else {
                if !pause(&cancel, HEAD_IDLE).await {
                    break;
                }
                continue;
            };

            let fetched: Result<Vec<_>, RpcError> = stream::iter(from..=to)
                .map(|height| self.fetch_one(height))
                .buffered(self.batch)
                .try_collect()
                .await;

            match fetched {
                Ok(blocks) => {
                    self.store.put_batch(&blocks, to)?;
                    debug!(from, to, "p-chain blocks stored");
                }
                Err(err) if is_transient(&err) => {
                    warn!(%err, "p-chain batch fetch failed");
                    if !pause(&cancel, TRANSIENT_BACKOFF).await {
                        break;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    async fn fetch_one(&self, height: BlockHeight) -> Result<(BlockHeight, Vec<u8>), RpcError> {
        let mut block = PlatformRpc::get_block(self.rpc.inner(), height).await?;

        let staking_refs: Vec<TxId> = block
            .txs
            .iter()
            .filter_map(|tx| match tx {
                serac_avalanche::model::PTransaction::RewardValidator { staking_tx_id, .. } => {
                    Some(*staking_tx_id)
                }
                _ => None,
            })
            .collect();

        for staking_tx in staking_refs {
            block
                .reward_utxos
                .extend(self.reward_utxos_with_retry(&staking_tx).await?);
        }

        encode(height, &block)
    }

    /// Reward UTXOs are required to make the block payload self-contained;
    /// exhausting the retries is fatal for the fetcher.
    async fn reward_utxos_with_retry(
        &self,
        staking_tx: &TxId,
    ) -> Result<Vec<serac_avalanche::model::PackedUtxo>, RpcError> {
        let mut last_err = None;

        for attempt in 1..=REWARD_FETCH_ATTEMPTS {
            match self.rpc.get_reward_utxos(staking_tx).await {
                Ok(utxos) => return Ok(utxos),
                Err(err) if is_transient(&err) => {
                    warn!(%staking_tx, attempt, %err, "reward utxo fetch failed");
                    last_err = Some(err);
                    tokio::time::sleep(REWARD_FETCH_DELAY).await;
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            RpcError::Transport("reward utxo fetch exhausted retries".into())
        }))
    }
}

fn encode(height: BlockHeight, block: &PBlock) -> Result<(BlockHeight, Vec<u8>), RpcError> {
    let payload = encode_p_payload(block).map_err(|e| RpcError::Malformed(e.to_string()))?;
    Ok((height, payload))
}

pub struct ExchangeFetcher<S> {
    store: S,
    rpc: NodeClient,
    batch: usize,
}

impl<S: BlockStore + TxLogStore> ExchangeFetcher<S> {
    pub fn new(store: S, rpc: NodeClient, batch: usize) -> Self {
        Self { store, rpc, batch }
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<(), Error> {
        let mut block_head: Option<BlockHeight> = None;
        let mut tx_head: Option<u64> = None;

        while !cancel.is_cancelled() {
            let moved_txs = match self.advance_tx_log(&mut tx_head).await {
                Ok(moved) => moved,
                Err(err) if is_transient(&err) => {
                    warn!(%err, "x-chain tx log fetch failed");
                    if !pause(&cancel, TRANSIENT_BACKOFF).await {
                        break;
                    }
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let moved_blocks = match self.advance_blocks(&mut block_head).await {
                Ok(moved) => moved,
                Err(err) if is_transient(&err) => {
                    warn!(%err, "x-chain block fetch failed");
                    if !pause(&cancel, TRANSIENT_BACKOFF).await {
                        break;
                    }
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if !moved_txs && !moved_blocks && !pause(&cancel, HEAD_IDLE).await {
                break;
            }
        }

        Ok(())
    }

    async fn advance_tx_log(&self, head: &mut Option<u64>) -> Result<bool, RpcError> {
        let next = TxLogStore::latest_tx(&self.store)?
            .map(|l| l + 1)
            .unwrap_or(0);

        let (refresh, _) = plan_range(next, *head, self.batch);
        if refresh {
            *head = Some(ExchangeRpc::latest_tx_index(&self.rpc).await?);
        }

        let (_, range) = plan_range(next, *head, self.batch);
        let Some((from, to)) = range else {
            return Ok(false);
        };

        let entries: Vec<_> = stream::iter(from..=to)
            .map(|index| async move {
                let record = ExchangeRpc::get_tx(&self.rpc, index).await?;
                let payload =
                    encode_x_tx(&record).map_err(|e| RpcError::Malformed(e.to_string()))?;
                Ok::<_, RpcError>((index, payload))
            })
            .buffered(self.batch)
            .try_collect()
            .await?;

        self.store.put_tx_batch(&entries, to)?;
        debug!(from, to, "x-chain tx entries stored");
        Ok(true)
    }

    async fn advance_blocks(&self, head: &mut Option<BlockHeight>) -> Result<bool, RpcError> {
        let next = BlockStore::latest(&self.store)?.map(|l| l + 1).unwrap_or(0);

        let (refresh, _) = plan_range(next, *head, self.batch);
        if refresh {
            *head = Some(ExchangeRpc::latest_height(&self.rpc).await?);
        }

        let (_, range) = plan_range(next, *head, self.batch);
        let Some((from, to)) = range else {
            return Ok(false);
        };

        let blocks: Vec<_> = stream::iter(from..=to)
            .map(|height| async move {
                let block = ExchangeRpc::get_block(&self.rpc, height).await?;
                let payload =
                    encode_x_block(&block).map_err(|e| RpcError::Malformed(e.to_string()))?;
                Ok::<_, RpcError>((height, payload))
            })
            .buffered(self.batch)
            .try_collect()
            .await?;

        self.store.put_batch(&blocks, to)?;
        debug!(from, to, "x-chain blocks stored");
        Ok(true)
    }
}

pub struct ContractFetcher<S> {
    store: S,
    rpc: NodeClient,
    batch: usize,
    ap5_height: Option<u64>,
}

impl<S: BlockStore> ContractFetcher<S> {
    pub fn new(store: S, rpc: NodeClient, batch: usize, ap5_height: Option<u64>) -> Self {
        Self {
            store,
            rpc,
            batch,
            ap5_height,
        }
    }

    fn ap5_active(&self, height: BlockHeight) -> bool {
        self.ap5_height.map(|b| height >= b).unwrap_or(true)
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<(), Error> {
        let mut head: Option<BlockHeight> = None;

        while !cancel.is_cancelled() {
            let next = self.store.latest()?.map(|l| l + 1).unwrap_or(0);

            let (refresh, _) = plan_range(next, head, self.batch);
            if refresh {
                match ContractRpc::latest_height(&self.rpc).await {
                    Ok(h) => head = Some(h),
                    Err(err) if is_transient(&err) => {
                        warn!(%err, "c-chain head refresh failed");
                        if !pause(&cancel, TRANSIENT_BACKOFF).await {
                            break;
                        }
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            let (_, range) = plan_range(next, head, self.batch);
            let Some((from, to)) = range else {
                if !pause(&cancel, HEAD_IDLE).await {
                    break;
                }
                continue;
            };

            let this = &self;
            let fetched: Result<Vec<_>, RpcError> = stream::iter(from..=to)
                .map(|height| async move {
                    let block = ContractRpc::get_block(&this.rpc, height).await?;
                    let payload = encode_c_payload(&block, this.ap5_active(height))
                        .map_err(|e| RpcError::Malformed(e.to_string()))?;
                    Ok::<_, RpcError>((height, payload))
                })
                .buffered(self.batch)
                .try_collect()
                .await;

            match fetched {
                Ok(blocks) => {
                    self.store.put_batch(&blocks, to)?;
                    debug!(from, to, "c-chain blocks stored");
                }
                Err(err) if is_transient(&err) => {
                    warn!(%err, "c-chain batch fetch failed");
                    if !pause(&cancel, TRANSIENT_BACKOFF).await {
                        break;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_planning_refreshes_near_the_head() {
        // far from head: no refresh
        let (refresh, range) = plan_range(0, Some(100), 10);
        assert!(!refresh);
        assert_eq!(range, Some((0, 9)));

        // within one batch of the head: refresh
        let (refresh, range) = plan_range(95, Some(100), 10);
        assert!(refresh);
        assert_eq!(range, Some((95, 100)));

        // caught up: refresh, nothing to fetch
        let (refresh, range) = plan_range(101, Some(100), 10);
        assert!(refresh);
        assert_eq!(range, None);

        // unknown head: always refresh
        let (refresh, range) = plan_range(0, None, 10);
        assert!(refresh);
        assert_eq!(range, None);
    }
}
