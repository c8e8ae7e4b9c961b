use clap::Parser;
use miette::Result;

mod archive;
mod common;
mod daemon;
mod data;
mod export;

#[derive(Parser)]
#[clap(name = "Serac")]
#[clap(bin_name = "serac")]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Path to the config file (default: serac.toml)
    #[clap(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the full node: fetchers, runners and services
    Daemon(daemon::Args),
    /// Run the warehouse exporter (configured from the environment)
    Export(export::Args),
    /// Summarize the local stores
    Data(data::Args),
    /// Build a pre-Cortina timestamp archive from a JSON dump
    BuildArchive(archive::Args),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Daemon(args) => {
            let config = common::Config::load(cli.config.as_deref())?;
            daemon::run(config, &args)
        }
        Command::Export(args) => export::run(&args),
        Command::Data(args) => {
            let config = common::Config::load(cli.config.as_deref())?;
            data::run(config, &args)
        }
        Command::BuildArchive(args) => archive::run(&args),
    }
}
