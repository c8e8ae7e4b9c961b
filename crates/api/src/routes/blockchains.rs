use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use serac_avalanche::indexers::{BlockchainIndexer, BlockchainRecord};
use serac_core::{BucketKind, Domain, Id32};

use crate::{Error, Facade};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockchainView {
    blockchain_id: String,
    blockchain_name: String,
    subnet_id: String,
    vm_id: String,
    create_block_height: u64,
    create_block_timestamp: u64,
}

impl From<BlockchainRecord> for BlockchainView {
    fn from(value: BlockchainRecord) -> Self {
        Self {
            blockchain_id: value.chain_id.to_string(),
            blockchain_name: value.name,
            subnet_id: value.subnet_id.to_string(),
            vm_id: value.vm_id.to_string(),
            create_block_height: value.created_at_height,
            create_block_timestamp: value.created_at_time,
        }
    }
}

fn indexer<D: Domain>(facade: &Facade<D>) -> BlockchainIndexer<D::Bucket> {
    BlockchainIndexer::new(facade.domain.bucket(BucketKind::Blockchains).clone())
}

pub async fn list<D: Domain>(
    Path(net): Path<String>,
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    facade.check_network(&net)?;

    let blockchains: Vec<BlockchainView> = indexer(&facade)
        .list()?
        .into_iter()
        .map(BlockchainView::from)
        .collect();

    Ok(Json(serde_json::json!({ "blockchains": blockchains })))
}

pub async fn by_id<D: Domain>(
    Path((net, id)): Path<(String, String)>,
    State(facade): State<Facade<D>>,
) -> Result<impl IntoResponse, Error> {
    facade.check_network(&net)?;

    let id = Id32::from_cb58(&id).map_err(|_| Error::NotFound)?;

    let record = indexer(&facade).get(&id)?.ok_or(Error::NotFound)?;

    Ok(Json(BlockchainView::from(record)))
}
