use miette::{miette, Context as _, IntoDiagnostic as _};
use serde::Deserialize;

use serac_avalanche::archive::TimestampArchive;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// JSON array of `{ "hash": "<64 hex chars>", "timestamp": <unix secs> }`
    #[clap(long)]
    input: std::path::PathBuf,

    /// Output archive path
    #[clap(long)]
    output: std::path::PathBuf,
}

#[derive(Debug, Deserialize)]
struct Entry {
    hash: String,
    timestamp: u64,
}

pub fn run(args: &Args) -> miette::Result<()> {
    let raw = std::fs::read(&args.input)
        .into_diagnostic()
        .context("reading input dump")?;

    let entries: Vec<Entry> = serde_json::from_slice(&raw)
        .into_diagnostic()
        .context("parsing input dump")?;

    let pairs = entries
        .iter()
        .map(|entry| {
            let bytes = hex::decode(entry.hash.trim_start_matches("0x"))
                .into_diagnostic()
                .with_context(|| format!("bad hash {}", entry.hash))?;

            let hash: [u8; 32] = bytes
                .try_into()
                .map_err(|_| miette!("hash {} is not 32 bytes", entry.hash))?;

            Ok((hash, entry.timestamp))
        })
        .collect::<miette::Result<Vec<_>>>()?;

    let archive = TimestampArchive::build(&pairs)
        .into_diagnostic()
        .context("building archive")?;

    std::fs::write(&args.output, &archive)
        .into_diagnostic()
        .context("writing archive")?;

    println!(
        "wrote {} entries ({} bytes) to {}",
        pairs.len(),
        archive.len(),
        args.output.display()
    );

    Ok(())
}
