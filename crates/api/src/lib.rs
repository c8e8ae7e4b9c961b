//! Glacier-parity HTTP query surface.

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;

use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace};
use tracing::Level;

use serac_avalanche::indexers::StatsSnapshot;
use serac_avalanche::rpc::NodeClient;
use serac_core::{ChainTag, Domain, ServeError};

mod error;
pub mod mapping;
mod params;
mod routes;

pub use error::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub listen_address: SocketAddr,
    pub permissive_cors: Option<bool>,
}

/// Shared request state: the domain plus the live collaborators the routes
/// enrich from.
pub struct FacadeInner<D: Domain> {
    pub domain: D,
    pub stats: watch::Receiver<Option<StatsSnapshot>>,
    /// P-chain node, for live validator enrichment. Optional: without it the
    /// validators endpoints serve indexed fields only.
    pub platform_rpc: Option<NodeClient>,
}

pub struct Facade<D: Domain>(pub Arc<FacadeInner<D>>);

impl<D: Domain> Clone for Facade<D> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<D: Domain> Deref for Facade<D> {
    type Target = FacadeInner<D>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<D: Domain> Facade<D> {
    /// Resolve `{net}` or fail with 404. `testnet` is an alias for fuji.
    pub fn check_network(&self, net: &str) -> Result<(), Error> {
        let name = self.domain.params().name.as_str();

        let matches = net == name || (net == "testnet" && name == "fuji");

        if matches {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    /// Resolve `{chain}` (alias or full id) or fail with 404.
    pub fn resolve_chain(&self, segment: &str) -> Result<ChainTag, Error> {
        self.domain
            .params()
            .resolve_chain(segment)
            .ok_or(Error::NotFound)
    }
}

pub fn router<D: Domain>(facade: Facade<D>, permissive_cors: bool) -> Router {
    Router::new()
        .route("/health", get(routes::health::live::<D>))
        .route("/status", get(routes::health::status::<D>))
        .route("/v1/networks/{net}", get(routes::network::details::<D>))
        .route(
            "/v1/networks/{net}/blockchains",
            get(routes::blockchains::list::<D>),
        )
        .route(
            "/v1/networks/{net}/blockchains/{blockchain_id}",
            get(routes::blockchains::by_id::<D>),
        )
        .route(
            "/v1/networks/{net}/subnets",
            get(routes::subnets::list::<D>),
        )
        .route(
            "/v1/networks/{net}/subnets/{id}",
            get(routes::subnets::by_id::<D>),
        )
        .route(
            "/v1/networks/{net}/validators",
            get(routes::validators::list::<D>),
        )
        .route(
            "/v1/networks/{net}/validators/{node_id}",
            get(routes::validators::by_node::<D>),
        )
        .route(
            "/v1/networks/{net}/rewards",
            get(routes::rewards::list::<D>),
        )
        .route(
            "/v1/networks/{net}/addresses/{address}/chains",
            get(routes::network::chains_for_address::<D>),
        )
        .route(
            "/v1/networks/{net}/blockchains/{blockchain_id}/utxos",
            get(routes::utxos::list::<D>),
        )
        .route(
            "/v1/networks/{net}/blockchains/{blockchain_id}/balances",
            get(routes::balances::get::<D>),
        )
        .with_state(facade)
        .layer(
            trace::TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(if permissive_cors {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
        })
}

/// Everything the driver needs besides the domain itself.
#[derive(Clone)]
pub struct DriverConfig {
    pub http: Config,
    pub stats: watch::Receiver<Option<StatsSnapshot>>,
    pub platform_rpc: Option<NodeClient>,
}

pub struct Driver;

impl<D: Domain> serac_core::Driver<D> for Driver {
    type Config = DriverConfig;

    async fn run(
        config: Self::Config,
        domain: D,
        cancel: tokio_util::sync::CancellationToken,
    ) -> Result<(), ServeError> {
        let facade = Facade(Arc::new(FacadeInner {
            domain,
            stats: config.stats,
            platform_rpc: config.platform_rpc,
        }));

        let app = router(facade, config.http.permissive_cors.unwrap_or_default());

        let listener = tokio::net::TcpListener::bind(config.http.listen_address)
            .await
            .map_err(ServeError::BindError)?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .map_err(ServeError::ShutdownError)?;

        Ok(())
    }
}
