//! The per-chain sync pipeline: fetchers pull raw payloads from the node
//! into the block store, runners replay them through the indexers.
//!
//! Chains run concurrently; within a chain, blocks advance in strict height
//! order. Cross-chain UTXO correctness never depends on relative chain
//! progress.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use serac_avalanche::{
    archive::TimestampArchive,
    indexers::{
        BlockchainIndexer, ChainListIndexer, RewardIndexer, SubnetIndexer, ValidatorIndexer,
    },
    model::{CBlock, PBlock, XBlock, XTxRecord},
    rpc::{AtomicInfoClient, CachedRpc, NodeClient},
    utxo::UtxoEngine,
};
use serac_core::{
    BlockIndexer, BucketKind, ChainTag, Domain, SyncConfig, TxIndexer, UpstreamConfig,
};

use crate::prelude::{CancellationToken, DomainAdapter, Error};

pub mod fetch;
pub mod run;

pub use fetch::{ContractFetcher, ExchangeFetcher, PlatformFetcher};
pub use run::{ContractRunner, ExchangeRunner, PlatformRunner};

type Fjall = DomainAdapter;

/// Build and spawn the full pipeline: three fetchers, three runners.
pub fn pipeline(
    domain: &Fjall,
    sync: &SyncConfig,
    upstream: &UpstreamConfig,
    cancel: CancellationToken,
) -> Result<Vec<JoinHandle<()>>, Error> {
    let params = domain.params().clone();

    let p_rpc = NodeClient::new(upstream.p_chain_url.clone());
    let x_rpc = NodeClient::new(upstream.x_chain_url.clone());
    let c_rpc = NodeClient::new(upstream.c_chain_url.clone());

    let mut engine = UtxoEngine::new(domain.utxos().clone(), params.clone());

    if let Some(path) = &sync.timestamp_archive {
        let archive = TimestampArchive::load_file(path).map_err(Error::config)?;
        info!(entries = archive.len(), "loaded pre-cortina timestamp archive");
        engine = engine.with_archive(Arc::new(archive));
    }

    engine = engine.with_atomic_probe(Arc::new(AtomicInfoClient::new(
        upstream.c_chain_url.clone(),
        params.c_chain_id,
        domain.rpc_cache().clone(),
    )));

    let engine = Arc::new(engine);

    let validators = ValidatorIndexer::new(domain.bucket(BucketKind::Validators).clone());
    let subnets = SubnetIndexer::new(domain.bucket(BucketKind::Subnets).clone());
    let blockchains = BlockchainIndexer::new(domain.bucket(BucketKind::Blockchains).clone());
    let rewards = RewardIndexer::new(domain.bucket(BucketKind::Rewards).clone());

    let chain_list = |chain: ChainTag| {
        ChainListIndexer::new(
            domain.bucket(BucketKind::ChainList).clone(),
            chain,
            params.chain_id(chain),
        )
    };

    let p_indexers: Vec<Arc<dyn BlockIndexer<PBlock> + Send + Sync>> = vec![
        engine.clone(),
        Arc::new(validators),
        Arc::new(subnets),
        Arc::new(blockchains),
        Arc::new(rewards),
        Arc::new(chain_list(ChainTag::Platform)),
    ];

    let x_indexers: Vec<Arc<dyn BlockIndexer<XBlock> + Send + Sync>> =
        vec![engine.clone(), Arc::new(chain_list(ChainTag::Exchange))];

    let x_tx_indexers: Vec<Arc<dyn TxIndexer<XTxRecord> + Send + Sync>> = vec![engine.clone()];

    let c_indexers: Vec<Arc<dyn BlockIndexer<CBlock> + Send + Sync>> =
        vec![engine.clone(), Arc::new(chain_list(ChainTag::Contract))];

    let batch = sync.fetch_batch();
    let run_batch = sync.run_batch();

    let mut tasks = Vec::new();

    let fetcher = PlatformFetcher::new(
        domain.blocks(ChainTag::Platform).clone(),
        CachedRpc::new(p_rpc, domain.rpc_cache().clone()),
        batch,
    );
    tasks.push(spawn_component("p-fetcher", fetcher.run(cancel.clone())));

    let fetcher = ExchangeFetcher::new(domain.blocks(ChainTag::Exchange).clone(), x_rpc, batch);
    tasks.push(spawn_component("x-fetcher", fetcher.run(cancel.clone())));

    let fetcher = ContractFetcher::new(
        domain.blocks(ChainTag::Contract).clone(),
        c_rpc,
        batch,
        sync.ap5_height,
    );
    tasks.push(spawn_component("c-fetcher", fetcher.run(cancel.clone())));

    let runner = PlatformRunner::new(
        domain.blocks(ChainTag::Platform).clone(),
        p_indexers,
        run_batch,
    );
    tasks.push(spawn_component("p-runner", runner.run(cancel.clone())));

    let runner = ExchangeRunner::new(
        domain.blocks(ChainTag::Exchange).clone(),
        x_indexers,
        x_tx_indexers,
        run_batch,
        sync.cortina_transition_index,
    );
    tasks.push(spawn_component("x-runner", runner.run(cancel.clone())));

    let runner = ContractRunner::new(
        domain.blocks(ChainTag::Contract).clone(),
        c_indexers,
        run_batch,
        sync.ap5_height,
    );
    tasks.push(spawn_component("c-runner", runner.run(cancel)));

    Ok(tasks)
}

/// Component failures halt that component only; the daemon stays up for the
/// other chains and services.
fn spawn_component(
    name: &'static str,
    task: impl std::future::Future<Output = Result<(), Error>> + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match task.await {
            Ok(()) => info!("[{name}] stopped"),
            Err(err) => error!("[{name}] halted: {err}"),
        }
    })
}
