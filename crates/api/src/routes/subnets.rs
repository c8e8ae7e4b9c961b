use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use serac_avalanche::indexers::{SubnetIndexer, SubnetRecord};
use serac_core::{BucketKind, Domain, Id32};

use crate::{Error, Facade};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubnetView {
    subnet_id: String,
    owner_addresses: Vec<String>,
    threshold: u32,
    locktime: u64,
    create_block_height: u64,
    create_block_timestamp: u64,
    is_l1: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    l1_validator_manager_chain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    l1_validator_manager_address: Option<String>,
}

impl From<SubnetRecord> for SubnetView {
    fn from(value: SubnetRecord) -> Self {
        Self {
            subnet_id: value.subnet_id.to_string(),
            owner_addresses: value.owners.addresses,
            threshold: value.owners.threshold,
            locktime: value.owners.locktime,
            create_block_height: value.created_at_height,
            create_block_timestamp: value.created_at_time,
            is_l1: value.is_l1,
            l1_validator_manager_chain_id: value.manager_chain_id.map(|id| id.to_string()),
            l1_validator_manager_address: value
                .manager_address
                .map(|addr| format!("0x{}", hex::encode(addr))),
        }
    }
}

fn indexer<D: Domain>(facade: &Facade<D>) -> SubnetIndexer<D::Bucket> {
    SubnetIndexer::new(facade.domain.bucket(BucketKind::Subnets).clone())
}

pub async fn list<D: Domain>(
    Path(net): Path<String>,
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    facade.check_network(&net)?;

    let subnets: Vec<SubnetView> = indexer(&facade)
        .list()?
        .into_iter()
        .map(SubnetView::from)
        .collect();

    Ok(Json(serde_json::json!({ "subnets": subnets })))
}

pub async fn by_id<D: Domain>(
    Path((net, id)): Path<(String, String)>,
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    facade.check_network(&net)?;

    let id = Id32::from_cb58(&id).map_err(|_| Error::NotFound)?;

    let record = indexer(&facade).get(&id)?.ok_or(Error::NotFound)?;

    Ok(Json(SubnetView::from(record)))
}
