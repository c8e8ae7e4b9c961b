use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};

use serac_avalanche::utxo::list_utxos;
use serac_core::Domain;

use crate::{
    mapping::shape_utxo,
    params::{now_unix, UtxoParams},
    Error, Facade,
};

pub async fn list<D: Domain>(
    Path((net, chain)): Path<(String, String)>,
    Query(params): Query<UtxoParams>,
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    facade.check_network(&net)?;
    let chain = facade.resolve_chain(&chain)?;

    let query = params.into_query(chain)?;

    let page = list_utxos(facade.domain.utxos(), chain, &query, now_unix())?;

    let utxos: Vec<_> = page.items.iter().map(|u| shape_utxo(u, chain)).collect();

    Ok(Json(serde_json::json!({
        "utxos": utxos,
        "nextPageToken": page.next_page_token,
    })))
}
