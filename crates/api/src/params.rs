//! Query-string parsing shared by the listing endpoints.

use serde::Deserialize;

use serac_avalanche::utxo::{SortBy, SortOrder, UtxoQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serac_core::{ChainTag, Id32};

use crate::Error;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoParams {
    pub addresses: Option<String>,
    pub page_size: Option<usize>,
    pub page_token: Option<String>,
    pub include_spent: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub asset_id: Option<String>,
    pub min_utxo_amount: Option<String>,
    pub block_timestamp: Option<u64>,
}

pub fn split_addresses(raw: Option<&str>) -> Result<Vec<String>, Error> {
    let addresses: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if addresses.is_empty() {
        return Err(Error::BadRequest("querystring/addresses is required"));
    }

    Ok(addresses)
}

impl UtxoParams {
    pub fn into_query(self, chain: ChainTag) -> Result<UtxoQuery, Error> {
        let addresses = split_addresses(self.addresses.as_deref())?;

        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(Error::BadRequest("querystring/pageSize must be in [1,100]"));
        }

        let sort_by = match self.sort_by.as_deref() {
            None | Some("timestamp") => SortBy::Timestamp,
            Some("amount") => SortBy::Amount,
            Some(_) => return Err(Error::BadRequest("querystring/sortBy must be timestamp or amount")),
        };

        let sort_order = match self.sort_order.as_deref() {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(_) => return Err(Error::BadRequest("querystring/sortOrder must be asc or desc")),
        };

        let asset_id = match self.asset_id.as_deref() {
            None => None,
            Some(_) if chain == ChainTag::Platform => {
                return Err(Error::BadRequest("assetId filtering is not available on the p-chain"))
            }
            Some(text) => Some(
                Id32::from_cb58(text).map_err(|_| Error::BadRequest("invalid assetId"))?,
            ),
        };

        Ok(UtxoQuery {
            addresses,
            include_spent: self.include_spent.unwrap_or(false),
            asset_id,
            min_amount: self.min_utxo_amount,
            block_timestamp: self.block_timestamp,
            sort_by,
            sort_order,
            // certain X-chain timestamp listings serve unspent entries first
            unspent_first: chain == ChainTag::Exchange && sort_by == SortBy::Timestamp,
            page_size,
            page_token: self.page_token,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceParams {
    pub addresses: Option<String>,
    pub block_timestamp: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page_size: Option<usize>,
}

impl PageParams {
    pub fn page_size(&self) -> Result<usize, Error> {
        let size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(Error::BadRequest("querystring/pageSize must be in [1,100]"));
        }
        Ok(size)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardParams {
    pub addresses: Option<String>,
    pub page_size: Option<usize>,
}

pub fn now_unix() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
