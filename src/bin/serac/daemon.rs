use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt as _;
use miette::{Context as _, IntoDiagnostic as _};
use tracing::{info, warn};

use serac::prelude::*;
use serac_avalanche::rpc::NodeClient;
use serac_core::BucketKind;

#[derive(Debug, clap::Args)]
pub struct Args {}

#[tokio::main]
pub async fn run(config: super::common::Config, _args: &Args) -> miette::Result<()> {
    super::common::setup_tracing(&config.logging)?;

    let params = config
        .network
        .resolve()
        .into_diagnostic()
        .context("resolving network settings")?;

    info!(network = %params.name, network_id = params.network_id, "starting serac daemon");

    let domain = DomainAdapter::open(&config.storage, params)
        .into_diagnostic()
        .context("opening data stores")?;

    let exit = CancellationToken::new();

    let platform_rpc = NodeClient::new(config.upstream.p_chain_url.clone());

    let stats = serac::stats::spawn_monitor(
        platform_rpc.clone(),
        domain.bucket(BucketKind::NetworkStats).clone(),
        exit.clone(),
    );

    let pipeline = serac::sync::pipeline(&domain, &config.sync, &config.upstream, exit.clone())
        .into_diagnostic()
        .context("starting sync pipeline")?;

    let drivers = FuturesUnordered::new();

    serac::serve::load_drivers(
        &drivers,
        config.serve,
        domain.clone(),
        stats,
        platform_rpc,
        exit.clone(),
    );

    wait_for_shutdown().await;
    info!("shutdown requested");
    exit.cancel();

    for task in pipeline {
        if let Err(err) = task.await {
            warn!(%err, "pipeline task did not stop cleanly");
        }
    }

    let mut drivers = drivers;
    while let Some(result) = drivers.next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%err, "driver stopped with error"),
            Err(err) => warn!(%err, "driver did not stop cleanly"),
        }
    }

    info!("bye");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(_) => {
                    let _ = ctrl_c.await;
                    return;
                }
            };

        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
