use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};

use serac_avalanche::utxo::{contract_balances, exchange_balances, platform_balances};
use serac_core::{ChainTag, Domain};

use crate::{
    mapping::{ContractBalancesView, ExchangeBalancesView, PlatformBalancesView},
    params::{now_unix, split_addresses, BalanceParams},
    Error, Facade,
};

pub async fn get<D: Domain>(
    Path((net, chain)): Path<(String, String)>,
    Query(params): Query<BalanceParams>,
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    facade.check_network(&net)?;
    let chain = facade.resolve_chain(&chain)?;

    let addresses = split_addresses(params.addresses.as_deref())?;

    let historical = params.block_timestamp.is_some();
    let at = params.block_timestamp.unwrap_or_else(now_unix);

    let store = facade.domain.utxos();
    let net_params = facade.domain.params();

    let balances = match chain {
        ChainTag::Platform => {
            let totals = platform_balances(store, net_params, &addresses, at, historical)?;
            serde_json::json!({ "balances": PlatformBalancesView::from(&totals) })
        }
        ChainTag::Exchange => {
            let totals = exchange_balances(store, net_params, &addresses, at, historical)?;
            serde_json::json!({ "balances": ExchangeBalancesView::from(&totals) })
        }
        ChainTag::Contract => {
            let totals = contract_balances(store, net_params, &addresses, at, historical)?;
            serde_json::json!({ "balances": ContractBalancesView::from(&totals) })
        }
    };

    Ok(Json(balances))
}
