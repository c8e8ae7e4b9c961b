//! Service driver loading, mirroring the sync pipeline's spawn style.

use futures_util::stream::FuturesUnordered;
use tokio::sync::watch;
use tracing::info;

use serac_avalanche::indexers::StatsSnapshot;
use serac_avalanche::rpc::NodeClient;
#[cfg(feature = "api")]
use serac_core::Driver as _;
use serac_core::ServeError;

use crate::adapters::DomainAdapter;
use crate::prelude::CancellationToken;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServeConfig {
    #[cfg(feature = "api")]
    pub api: Option<serac_api::Config>,
}

#[allow(unused_variables)]
pub fn load_drivers(
    all_drivers: &FuturesUnordered<tokio::task::JoinHandle<Result<(), ServeError>>>,
    config: ServeConfig,
    domain: DomainAdapter,
    stats: watch::Receiver<Option<StatsSnapshot>>,
    platform_rpc: NodeClient,
    exit: CancellationToken,
) {
    #[cfg(feature = "api")]
    if let Some(cfg) = config.api {
        info!("found api config");

        let context = serac_api::DriverConfig {
            http: cfg,
            stats,
            platform_rpc: Some(platform_rpc),
        };

        let driver = serac_api::Driver::run(context, domain, exit);

        let task = tokio::spawn(driver);

        all_drivers.push(task);
    }
}
