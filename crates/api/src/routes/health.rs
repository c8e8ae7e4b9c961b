use axum::{extract::State, response::IntoResponse, Json};

use serac_core::{BlockStore as _, ChainTag, Domain, StageWatermark, TxLogStore as _, UtxoStore as _};

use crate::{params::now_unix, Error, Facade};

pub async fn live<D: Domain>(State(_facade): State<Facade<D>>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Operational snapshot: per-chain store tips, engine watermarks and the
/// freshness of the network-stats monitor.
pub async fn status<D: Domain>(
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    let domain = &facade.domain;

    let mut chains = serde_json::Map::new();

    for chain in ChainTag::ALL {
        let latest = domain.blocks(chain).latest()?;

        let watermark = match chain {
            ChainTag::Platform => domain.utxos().watermark(StageWatermark::Platform)?,
            ChainTag::Exchange => domain.utxos().watermark(StageWatermark::ExchangeBlocks)?,
            ChainTag::Contract => domain.utxos().watermark(StageWatermark::Contract)?,
        };

        chains.insert(
            chain.alias().to_string(),
            serde_json::json!({
                "storedHeight": latest,
                "indexedHeight": watermark,
            }),
        );
    }

    let pre_cortina = serde_json::json!({
        "storedIndex": domain.x_tx_log().latest_tx()?,
        "indexedIndex": domain.utxos().watermark(StageWatermark::ExchangePreCortina)?,
    });

    let stats_age = facade
        .stats
        .borrow()
        .as_ref()
        .map(|snapshot| now_unix().saturating_sub(snapshot.taken_at));

    Ok(Json(serde_json::json!({
        "network": domain.params().name,
        "chains": chains,
        "xPreCortina": pre_cortina,
        "statsAgeSeconds": stats_age,
    })))
}
