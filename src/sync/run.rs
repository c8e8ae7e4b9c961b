//! Runners: replay stored payloads through the chain's indexers.
//!
//! Blocks decode once per batch (parallel fan-out) and multicast to every
//! lagging indexer. Watermark advancement is the indexer's own job, inside
//! the same storage batch as its state writes. Parse failures are fatal:
//! indexing never skips a block.

use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use serac_avalanche::{
    codec::{decode_c_payload, decode_p_payload, decode_x_block, decode_x_tx},
    model::{CBlock, PBlock, XBlock, XTxRecord},
};
use serac_core::{
    BlockHeight, BlockIndexer, BlockStore, IndexError, TxIndexer, TxLogStore,
};

use crate::prelude::{CancellationToken, Error};

const STORE_IDLE: Duration = Duration::from_secs(1);
const INDEXER_BACKOFF: Duration = Duration::from_secs(1);

async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// The height every consumer can rely on: the minimum across indexers.
pub fn global_watermark(watermarks: &[Option<BlockHeight>]) -> Option<BlockHeight> {
    watermarks
        .iter()
        .map(|wm| wm.unwrap_or(0))
        .min()
        .filter(|_| watermarks.iter().all(|wm| wm.is_some()))
}

/// Load, decode and multicast one batch. Returns whether anything moved.
async fn advance<B, S, F>(
    store: &S,
    decode: F,
    indexers: &[Arc<dyn BlockIndexer<B> + Send + Sync>],
    batch: usize,
) -> Result<bool, Error>
where
    B: Send + Sync + 'static,
    S: BlockStore,
    F: Fn(&[u8]) -> Result<B, serac_avalanche::ChainError> + Send + Sync + Copy + 'static,
{
    let Some(latest) = store.latest()? else {
        return Ok(false);
    };

    let mut watermarks = Vec::with_capacity(indexers.len());
    for indexer in indexers {
        watermarks.push(indexer.watermark()?);
    }

    let from = watermarks
        .iter()
        .map(|wm| wm.map(|w| w + 1).unwrap_or(0))
        .min()
        .unwrap_or(0);

    if from > latest {
        return Ok(false);
    }

    let to = (from + batch as u64 - 1).min(latest);

    let mut raws = Vec::with_capacity((to - from + 1) as usize);
    for height in from..=to {
        let raw = store.get(height)?.ok_or_else(|| {
            Error::Chain(format!("gap in block store at height {height}"))
        })?;
        raws.push(raw);
    }

    // decode once, in parallel, off the async executor
    let blocks: Arc<Vec<B>> = tokio::task::spawn_blocking(move || {
        raws.par_iter()
            .map(|raw| decode(raw))
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(Error::storage)?
    .map(Arc::new)?;

    for (indexer, watermark) in indexers.iter().zip(watermarks) {
        let next = watermark.map(|w| w + 1).unwrap_or(0);

        if next > to {
            continue;
        }

        let offset = (next - from) as usize;
        let indexer = indexer.clone();
        let blocks = blocks.clone();

        tokio::task::spawn_blocking(move || indexer.process_batch(&blocks[offset..]))
            .await
            .map_err(Error::storage)??;
    }

    debug!(from, to, "batch indexed");
    Ok(true)
}

fn handle_index_error(component: &str, err: &Error) -> bool {
    match err {
        Error::Index(inner @ IndexError::Transient(_))
        | Error::Index(inner @ IndexError::MissingCrossChainData(_)) => {
            warn!("[{component}] retrying batch: {inner}");
            true
        }
        _ => false,
    }
}

pub struct PlatformRunner<S> {
    store: S,
    indexers: Vec<Arc<dyn BlockIndexer<PBlock> + Send + Sync>>,
    batch: usize,
}

impl<S: BlockStore> PlatformRunner<S> {
    pub fn new(
        store: S,
        indexers: Vec<Arc<dyn BlockIndexer<PBlock> + Send + Sync>>,
        batch: usize,
    ) -> Self {
        Self {
            store,
            indexers,
            batch,
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<(), Error> {
        info!(indexers = self.indexers.len(), "p-chain runner starting");

        while !cancel.is_cancelled() {
            match advance(&self.store, decode_p_payload, &self.indexers, self.batch).await {
                Ok(true) => {}
                Ok(false) => {
                    if !pause(&cancel, STORE_IDLE).await {
                        break;
                    }
                }
                Err(err) if handle_index_error("p-runner", &err) => {
                    if !pause(&cancel, INDEXER_BACKOFF).await {
                        break;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}

pub struct ExchangeRunner<S> {
    store: S,
    indexers: Vec<Arc<dyn BlockIndexer<XBlock> + Send + Sync>>,
    tx_indexers: Vec<Arc<dyn TxIndexer<XTxRecord> + Send + Sync>>,
    batch: usize,
    cortina_transition_index: u64,
}

impl<S: BlockStore + TxLogStore> ExchangeRunner<S> {
    pub fn new(
        store: S,
        indexers: Vec<Arc<dyn BlockIndexer<XBlock> + Send + Sync>>,
        tx_indexers: Vec<Arc<dyn TxIndexer<XTxRecord> + Send + Sync>>,
        batch: usize,
        cortina_transition_index: u64,
    ) -> Self {
        Self {
            store,
            indexers,
            tx_indexers,
            batch,
            cortina_transition_index,
        }
    }

    /// Drain the sequential tx log up to the Cortina transition.
    async fn advance_pre_cortina(&self) -> Result<bool, Error> {
        let Some(latest) = TxLogStore::latest_tx(&self.store)? else {
            return Ok(false);
        };

        let ceiling = latest.min(self.cortina_transition_index.saturating_sub(1));

        let mut moved = false;

        for indexer in &self.tx_indexers {
            let next = indexer.tx_watermark()?.map(|w| w + 1).unwrap_or(0);

            if next > ceiling {
                continue;
            }

            let to = (next + self.batch as u64 - 1).min(ceiling);

            let mut records = Vec::with_capacity((to - next + 1) as usize);
            for index in next..=to {
                let raw = self.store.get_tx(index)?.ok_or_else(|| {
                    Error::Chain(format!("gap in x-chain tx log at index {index}"))
                })?;
                records.push(decode_x_tx(&raw)?);
            }

            let indexer = indexer.clone();
            tokio::task::spawn_blocking(move || indexer.process_tx_batch(&records))
                .await
                .map_err(Error::storage)??;

            moved = true;
        }

        Ok(moved)
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<(), Error> {
        info!(indexers = self.indexers.len(), "x-chain runner starting");

        while !cancel.is_cancelled() {
            let pre = match self.advance_pre_cortina().await {
                Ok(moved) => moved,
                Err(err) if handle_index_error("x-runner", &err) => {
                    if !pause(&cancel, INDEXER_BACKOFF).await {
                        break;
                    }
                    continue;
                }
                Err(err) => return Err(err),
            };

            let blocks =
                match advance(&self.store, decode_x_block, &self.indexers, self.batch).await {
                    Ok(moved) => moved,
                    Err(err) if handle_index_error("x-runner", &err) => {
                        if !pause(&cancel, INDEXER_BACKOFF).await {
                            break;
                        }
                        continue;
                    }
                    Err(err) => return Err(err),
                };

            if !pre && !blocks && !pause(&cancel, STORE_IDLE).await {
                break;
            }
        }

        Ok(())
    }
}

pub struct ContractRunner<S> {
    store: S,
    indexers: Vec<Arc<dyn BlockIndexer<CBlock> + Send + Sync>>,
    batch: usize,
    ap5_height: Option<u64>,
}

impl<S: BlockStore> ContractRunner<S> {
    pub fn new(
        store: S,
        indexers: Vec<Arc<dyn BlockIndexer<CBlock> + Send + Sync>>,
        batch: usize,
        ap5_height: Option<u64>,
    ) -> Self {
        Self {
            store,
            indexers,
            batch,
            ap5_height,
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<(), Error> {
        info!(indexers = self.indexers.len(), "c-chain runner starting");

        let ap5_height = self.ap5_height;

        // payloads know their own height; AP5 framing is a function of it
        let decode = move |raw: &[u8]| {
            let probe = decode_c_payload(raw, true);

            match (probe, ap5_height) {
                (Ok(block), _) => Ok(block),
                (Err(_), Some(_)) => decode_c_payload(raw, false),
                (Err(err), None) => Err(err),
            }
        };

        while !cancel.is_cancelled() {
            match advance(&self.store, decode, &self.indexers, self.batch).await {
                Ok(true) => {}
                Ok(false) => {
                    if !pause(&cancel, STORE_IDLE).await {
                        break;
                    }
                }
                Err(err) if handle_index_error("c-runner", &err) => {
                    if !pause(&cancel, INDEXER_BACKOFF).await {
                        break;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}
