//! The exporter daemon: a finite state machine over
//! `{catching_up, steady, error_backoff, stopping}`.
//!
//! The warehouse's MAX(BLOCK_NUMBER) is the single source of truth for what
//! has been committed; every iteration re-reads it, so a crash or rollback
//! at any point costs at most one repeated batch (at-least-once).

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::ExporterConfig, model::NormalizedBlock, transform::transform, writer::Warehouse,
    ExportError,
};

#[trait_variant::make(Send)]
pub trait IngestionSource: Send + Sync + 'static {
    /// Latest block available upstream, `None` while the chain is empty.
    async fn latest_block(&self) -> Result<Option<u64>, ExportError>;

    async fn fetch_blocks(
        &self,
        from: u64,
        limit: usize,
    ) -> Result<Vec<NormalizedBlock>, ExportError>;
}

/// HTTP client for the ingestion service.
#[derive(Clone)]
pub struct IngestionClient {
    http: reqwest::Client,
    base_url: String,
}

impl IngestionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl IngestionSource for IngestionClient {
    async fn latest_block(&self) -> Result<Option<u64>, ExportError> {
        #[derive(serde::Deserialize)]
        struct Latest {
            number: Option<u64>,
        }

        let latest: Latest = self
            .http
            .get(format!("{}/v1/blocks/latest", self.base_url))
            .send()
            .await
            .map_err(|e| ExportError::Ingestion(e.to_string()))?
            .json()
            .await
            .map_err(|e| ExportError::Ingestion(e.to_string()))?;

        Ok(latest.number)
    }

    async fn fetch_blocks(
        &self,
        from: u64,
        limit: usize,
    ) -> Result<Vec<NormalizedBlock>, ExportError> {
        self.http
            .get(format!(
                "{}/v1/blocks?from={from}&limit={limit}",
                self.base_url
            ))
            .send()
            .await
            .map_err(|e| ExportError::Ingestion(e.to_string()))?
            .json()
            .await
            .map_err(|e| ExportError::Ingestion(e.to_string()))
    }
}

/// Outcome of one daemon iteration, driving the FSM transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Full batch written; loop again immediately.
    WroteFull(usize),
    /// Short batch written; the head is near, sleep `partial_wait`.
    WrotePartial(usize),
    /// Nothing new upstream; sleep `partial_wait`.
    Idle,
}

pub struct Daemon<W, I> {
    warehouse: W,
    source: I,
    batch_size: usize,
    partial_wait: Duration,
    error_backoff: Duration,
}

impl<W: Warehouse, I: IngestionSource> Daemon<W, I> {
    pub fn new(config: &ExporterConfig, warehouse: W, source: I) -> Self {
        Self {
            warehouse,
            source,
            batch_size: config.batch_size,
            partial_wait: config.partial_wait,
            error_backoff: config.error_backoff,
        }
    }

    /// One iteration: read MAX, stream the next range, transform, write.
    pub async fn step(&self) -> Result<StepOutcome, ExportError> {
        // -1 sentinel when the table is empty; the next block is MAX + 1
        let next = match self.warehouse.max_block_number().await? {
            Some(max) => max + 1,
            None => 0,
        };

        let latest = self.source.latest_block().await?;

        let Some(latest) = latest.filter(|latest| next <= *latest) else {
            return Ok(StepOutcome::Idle);
        };

        let blocks = self.source.fetch_blocks(next, self.batch_size).await?;

        if blocks.is_empty() {
            return Ok(StepOutcome::Idle);
        }

        let batch = transform(&blocks)?;
        self.warehouse.write_batch(&batch).await?;

        let written = batch.block_count();
        info!(from = next, latest, written, "exported batch");

        if written == self.batch_size {
            Ok(StepOutcome::WroteFull(written))
        } else {
            Ok(StepOutcome::WrotePartial(written))
        }
    }

    /// Run until cancelled. SIGINT/SIGTERM cancel the token; the loop exits
    /// cleanly after the current batch or sleep.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                info!("exporter stopping");
                return;
            }

            let wait = match self.step().await {
                // catching-up mode: no sleep between full batches
                Ok(StepOutcome::WroteFull(_)) => continue,
                Ok(StepOutcome::WrotePartial(_)) | Ok(StepOutcome::Idle) => self.partial_wait,
                Err(err) => {
                    error!("[exporter] batch failed: {err}");
                    self.error_backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("exporter stopping");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::model::{NormalizedReceipt, NormalizedTx};

    fn mk_block(number: u64) -> NormalizedBlock {
        NormalizedBlock {
            number,
            hash: format!("0xb{number}"),
            parent_hash: format!("0xb{}", number.saturating_sub(1)),
            timestamp: 1_700_000_000 + number,
            gas_limit: 15_000_000,
            gas_used: 0,
            base_fee_per_gas: None,
            miner: "0xc0de".into(),
            difficulty: "1".into(),
            size: 100,
            transactions_root: "0xt".into(),
            receipts_root: "0xr".into(),
            state_root: "0xs".into(),
            extra_data: vec![],
            transactions: vec![NormalizedTx {
                hash: format!("0xt{number}"),
                from: "0xfeed".into(),
                to: Some("0xbeef".into()),
                nonce: number,
                index: 0,
                value: "0".into(),
                input: vec![],
                gas_limit: 21_000,
                gas_price: Some("1".into()),
                max_fee_per_gas: None,
                max_priority_fee_per_gas: None,
                tx_type: 0,
                receipt: NormalizedReceipt {
                    status: 1,
                    gas_used: 21_000,
                    cumulative_gas_used: 21_000,
                    effective_gas_price: Some("1".into()),
                    contract_address: None,
                    logs: vec![],
                },
                traces: vec![],
            }],
        }
    }

    /// Commits move MAX atomically, like the real single-transaction writer.
    struct FakeWarehouse {
        max: AtomicU64,
        has_rows: std::sync::atomic::AtomicBool,
        writes: Mutex<Vec<usize>>,
    }

    impl FakeWarehouse {
        fn empty() -> Self {
            Self {
                max: AtomicU64::new(0),
                has_rows: std::sync::atomic::AtomicBool::new(false),
                writes: Mutex::new(vec![]),
            }
        }

        fn at(max: u64) -> Self {
            Self {
                max: AtomicU64::new(max),
                has_rows: std::sync::atomic::AtomicBool::new(true),
                writes: Mutex::new(vec![]),
            }
        }
    }

    impl Warehouse for FakeWarehouse {
        async fn max_block_number(&self) -> Result<Option<u64>, ExportError> {
            if self.has_rows.load(Ordering::SeqCst) {
                Ok(Some(self.max.load(Ordering::SeqCst)))
            } else {
                Ok(None)
            }
        }

        async fn write_batch(&self, batch: &crate::rows::ExportBatch) -> Result<(), ExportError> {
            let last = batch.blocks.last().map(|b| b.block_number).unwrap_or(0);
            self.max.store(last, Ordering::SeqCst);
            self.has_rows.store(true, Ordering::SeqCst);
            self.writes.lock().unwrap().push(batch.block_count());
            Ok(())
        }
    }

    struct FakeSource {
        latest: u64,
    }

    impl IngestionSource for FakeSource {
        async fn latest_block(&self) -> Result<Option<u64>, ExportError> {
            Ok(Some(self.latest))
        }

        async fn fetch_blocks(
            &self,
            from: u64,
            limit: usize,
        ) -> Result<Vec<NormalizedBlock>, ExportError> {
            Ok((from..=self.latest).take(limit).map(mk_block).collect())
        }
    }

    fn daemon(warehouse: FakeWarehouse, latest: u64, batch: usize) -> Daemon<FakeWarehouse, FakeSource> {
        Daemon {
            warehouse,
            source: FakeSource { latest },
            batch_size: batch,
            partial_wait: Duration::from_secs(3600),
            error_backoff: Duration::from_secs(300),
        }
    }

    #[tokio::test]
    async fn catch_up_runs_full_batches_then_idles() {
        // warehouse at 1000, upstream at 3500, batches of 1000
        let daemon = daemon(FakeWarehouse::at(1000), 3500, 1000);

        assert_eq!(daemon.step().await.unwrap(), StepOutcome::WroteFull(1000));
        assert_eq!(daemon.step().await.unwrap(), StepOutcome::WroteFull(1000));
        assert_eq!(daemon.step().await.unwrap(), StepOutcome::WrotePartial(500));

        // next = 3501 > latest = 3500
        assert_eq!(daemon.step().await.unwrap(), StepOutcome::Idle);

        let writes = daemon.warehouse.writes.lock().unwrap().clone();
        assert_eq!(writes, vec![1000, 1000, 500]);
        assert_eq!(daemon.warehouse.max.load(Ordering::SeqCst), 3500);
    }

    #[tokio::test]
    async fn empty_warehouse_starts_from_genesis() {
        let daemon = daemon(FakeWarehouse::empty(), 4, 10);

        assert_eq!(daemon.step().await.unwrap(), StepOutcome::WrotePartial(5));
        assert_eq!(daemon.warehouse.max.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn repeated_steps_are_resumable_from_max() {
        let daemon = daemon(FakeWarehouse::at(9), 25, 10);

        assert_eq!(daemon.step().await.unwrap(), StepOutcome::WroteFull(10));
        // MAX moved to 19, so the next range starts at 20 with no overlap
        assert_eq!(daemon.step().await.unwrap(), StepOutcome::WrotePartial(6));
        assert_eq!(daemon.warehouse.max.load(Ordering::SeqCst), 25);
    }
}
