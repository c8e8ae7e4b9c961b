use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::warn;

use serac_avalanche::indexers::{enrich_validators, ValidatorIndexer, ValidatorRecord};
use serac_avalanche::rpc::{LiveValidator, PlatformRpc as _};
use serac_core::{BucketKind, Domain, Id32};

use crate::{params::PageParams, Error, Facade};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorParams {
    pub subnet_id: Option<String>,
    pub page_size: Option<usize>,
}

fn indexer<D: Domain>(facade: &Facade<D>) -> ValidatorIndexer<D::Bucket> {
    ValidatorIndexer::new(facade.domain.bucket(BucketKind::Validators).clone())
}

/// Live fields come from the node at query time; a node outage degrades the
/// response to indexed fields instead of failing it.
async fn live_view<D: Domain>(facade: &Facade<D>) -> Vec<LiveValidator> {
    let Some(rpc) = facade.platform_rpc.as_ref() else {
        return Vec::new();
    };

    match rpc.current_validators().await {
        Ok(live) => live,
        Err(err) => {
            warn!(%err, "live validator enrichment unavailable");
            Vec::new()
        }
    }
}

pub async fn list<D: Domain>(
    Path(net): Path<String>,
    Query(params): Query<ValidatorParams>,
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    facade.check_network(&net)?;

    let page_size = PageParams {
        page_size: params.page_size,
    }
    .page_size()?;

    // primary network when no subnet filter is given
    let subnet_id = match params.subnet_id.as_deref() {
        None => Id32::default(),
        Some(text) => Id32::from_cb58(text).map_err(|_| Error::BadRequest("invalid subnetId"))?,
    };

    let records: Vec<ValidatorRecord> = indexer(&facade).by_subnet(&subnet_id, page_size)?;

    let live = live_view(&facade).await;

    Ok(Json(serde_json::json!({
        "validators": enrich_validators(records, &live),
    })))
}

pub async fn by_node<D: Domain>(
    Path((net, node_id)): Path<(String, String)>,
    Query(params): Query<PageParams>,
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    facade.check_network(&net)?;

    let page_size = params.page_size()?;

    let records = indexer(&facade).by_node(&node_id, page_size)?;

    if records.is_empty() {
        return Err(Error::NotFound);
    }

    let live = live_view(&facade).await;

    Ok(Json(serde_json::json!({
        "validators": enrich_validators(records, &live),
    })))
}
