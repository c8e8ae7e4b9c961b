use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use itertools::Itertools as _;
use serde::Serialize;

use serac_avalanche::indexers::{RewardEntry, RewardIndexer};
use serac_avalanche::utxo::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serac_core::{BucketKind, Domain};

use crate::{
    params::{split_addresses, RewardParams},
    Error, Facade,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RewardView {
    staking_tx_hash: String,
    reward_tx_hash: String,
    node_id: String,
    amount_staked: String,
    amount_rewarded: String,
    start_timestamp: u64,
    end_timestamp: u64,
    rewarded_at: u64,
    reward_addresses: Vec<String>,
}

impl From<RewardEntry> for RewardView {
    fn from(value: RewardEntry) -> Self {
        Self {
            staking_tx_hash: value.staking.staking_tx.to_string(),
            reward_tx_hash: value.reward.reward_tx.to_string(),
            node_id: value.staking.node_id,
            amount_staked: value.staking.amount_staked.to_string(),
            amount_rewarded: value.reward.amount.to_string(),
            start_timestamp: value.staking.start_time,
            end_timestamp: value.staking.end_time,
            rewarded_at: value.reward.rewarded_at,
            reward_addresses: value.staking.reward_addresses,
        }
    }
}

pub async fn list<D: Domain>(
    Path(net): Path<String>,
    Query(params): Query<RewardParams>,
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    facade.check_network(&net)?;

    let addresses = split_addresses(params.addresses.as_deref())?;

    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(Error::BadRequest("querystring/pageSize must be in [1,100]"));
    }

    let indexer = RewardIndexer::new(facade.domain.bucket(BucketKind::Rewards).clone());

    let rewards: Vec<RewardView> = addresses
        .iter()
        .map(|address| indexer.rewards_for_address(address, page_size))
        .flatten_ok()
        .map_ok(RewardView::from)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .unique_by(|r| r.staking_tx_hash.clone())
        .sorted_by(|a, b| b.end_timestamp.cmp(&a.end_timestamp))
        .take(page_size)
        .collect();

    Ok(Json(serde_json::json!({ "historicalRewards": rewards })))
}
