use miette::{Context as _, IntoDiagnostic as _};

use serac::prelude::*;
use serac_core::{bucket_watermark, BlockStore as _, TxLogStore as _, UtxoStore as _};

#[derive(Debug, clap::Args)]
pub struct Args {}

pub fn run(config: super::common::Config, _args: &Args) -> miette::Result<()> {
    let params = config
        .network
        .resolve()
        .into_diagnostic()
        .context("resolving network settings")?;

    let domain = DomainAdapter::open(&config.storage, params)
        .into_diagnostic()
        .context("opening data stores")?;

    println!("network: {}", domain.params().name);
    println!();

    for chain in ChainTag::ALL {
        let latest = domain.blocks(chain).latest().into_diagnostic()?;

        let watermark = match chain {
            ChainTag::Platform => domain
                .utxos()
                .watermark(StageWatermark::Platform)
                .into_diagnostic()?,
            ChainTag::Exchange => domain
                .utxos()
                .watermark(StageWatermark::ExchangeBlocks)
                .into_diagnostic()?,
            ChainTag::Contract => domain
                .utxos()
                .watermark(StageWatermark::Contract)
                .into_diagnostic()?,
        };

        println!(
            "{:8} stored={:>12} indexed={:>12}",
            chain.alias(),
            fmt(latest),
            fmt(watermark)
        );
    }

    println!(
        "{:8} stored={:>12} indexed={:>12}",
        "x-txlog",
        fmt(domain.x_tx_log().latest_tx().into_diagnostic()?),
        fmt(domain
            .utxos()
            .watermark(StageWatermark::ExchangePreCortina)
            .into_diagnostic()?)
    );

    println!();

    for kind in BucketKind::ALL {
        let watermark = bucket_watermark(domain.bucket(kind)).into_diagnostic()?;
        println!("{:14} watermark={}", kind.dir_name(), fmt(watermark));
    }

    Ok(())
}

fn fmt(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}
