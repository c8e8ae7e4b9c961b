use miette::{Context as _, IntoDiagnostic as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{filter::Targets, prelude::*};

use serac::serve::ServeConfig;
use serac_core::{LoggingConfig, NetworkSettings, StorageConfig, SyncConfig, UpstreamConfig};

#[derive(Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkSettings,
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    pub sync: SyncConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(explicit: Option<&Path>) -> miette::Result<Self> {
        let mut builder = config::Config::builder();

        builder = match explicit {
            Some(path) => builder.add_source(
                config::File::with_name(&path.to_string_lossy()).required(true),
            ),
            None => builder.add_source(config::File::with_name("serac.toml").required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("SERAC")
                .separator("_")
                .ignore_empty(true),
        );

        builder
            .build()
            .into_diagnostic()
            .context("loading config")?
            .try_deserialize()
            .into_diagnostic()
            .context("parsing config")
    }
}

pub fn setup_tracing(config: &LoggingConfig) -> miette::Result<()> {
    let level = config
        .max_level
        .as_deref()
        .map(|raw| raw.parse::<Level>())
        .transpose()
        .into_diagnostic()
        .context("parsing logging.max_level")?
        .unwrap_or(Level::INFO);

    let filter = Targets::new()
        .with_target("serac", level)
        .with_target("serac_core", level)
        .with_target("serac_avalanche", level)
        .with_target("serac_fjall", level)
        .with_target("serac_api", level)
        .with_target("serac_snowflake", level);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    Ok(())
}
