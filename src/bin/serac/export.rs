use miette::IntoDiagnostic as _;
use tracing::info;

use serac::prelude::CancellationToken;
use serac_snowflake::{Daemon, ExporterConfig, IngestionSource as _, SnowflakeWriter};

#[derive(Debug, clap::Args)]
pub struct Args {}

#[tokio::main]
pub async fn run(_args: &Args) -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    // configuration problems are fatal before any work starts
    let config = match ExporterConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("[exporter] configuration error: {err}");
            std::process::exit(1);
        }
    };

    let writer = match SnowflakeWriter::new(config.snowflake.clone()) {
        Ok(writer) => writer,
        Err(err) => {
            eprintln!("[exporter] configuration error: {err}");
            std::process::exit(1);
        }
    };

    let source = serac_snowflake::daemon::IngestionClient::new(config.ingestion_url.clone());

    // fail fast when the ingestion service is unreachable at startup
    source.latest_block().await.into_diagnostic()?;

    info!(
        batch_size = config.batch_size,
        "exporter starting"
    );

    let daemon = Daemon::new(&config, writer, source);

    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        signal_cancel.cancel();
    });

    daemon.run(cancel).await;

    Ok(())
}
