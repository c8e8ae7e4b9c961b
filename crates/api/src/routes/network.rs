use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use serac_avalanche::indexers::ChainListIndexer;
use serac_core::{BucketKind, ChainTag, Domain};

use crate::{Error, Facade};

/// Network details plus the freshest stats snapshot (≤ 30 s old in steady
/// state).
pub async fn details<D: Domain>(
    Path(net): Path<String>,
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    facade.check_network(&net)?;

    let params = facade.domain.params();
    let stats = facade.stats.borrow().clone();

    let stats = stats.map(|s| {
        serde_json::json!({
            "validatorCount": s.validator_count,
            "totalStake": s.total_stake.to_string(),
            "peerCount": s.peer_count,
            "supply": s.supply.to_string(),
            "takenAt": s.taken_at,
        })
    });

    Ok(Json(serde_json::json!({
        "networkId": params.network_id,
        "name": params.name,
        "chains": {
            "p-chain": params.p_chain_id.to_string(),
            "x-chain": params.x_chain_id.to_string(),
            "c-chain": params.c_chain_id.to_string(),
        },
        "avaxAssetId": params.avax_asset_id.to_string(),
        "stats": stats,
    })))
}

pub async fn chains_for_address<D: Domain>(
    Path((net, address)): Path<(String, String)>,
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    facade.check_network(&net)?;

    let params = facade.domain.params();

    let indexer = ChainListIndexer::new(
        facade.domain.bucket(BucketKind::ChainList).clone(),
        ChainTag::Platform,
        params.p_chain_id,
    );

    let chain_ids: Vec<String> = indexer
        .chains_for_address(&address)?
        .into_iter()
        .map(|id| id.to_string())
        .collect();

    Ok(Json(serde_json::json!({
        "address": address,
        "chainIds": chain_ids,
    })))
}
