//! In-memory filtering, sorting and pagination over the indexed UTXO set.

use std::collections::BTreeSet;

use base64::Engine as _;
use num_bigint::BigUint;

use serac_core::{
    AssetId, ChainTag, SpendInfo, StoreError, StoredUtxo, UnixTime, UtxoId, UtxoStore,
};

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

pub const MIN_PAGE_SIZE: usize = 1;
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Timestamp,
    Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone)]
pub struct UtxoQuery {
    pub addresses: Vec<String>,
    pub include_spent: bool,
    pub asset_id: Option<AssetId>,
    /// Decimal digits, arbitrary precision
    pub min_amount: Option<String>,
    /// Historical point: creation strictly before, consumption strictly after
    pub block_timestamp: Option<UnixTime>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    /// Partition unspent records before spent ones ahead of the primary sort
    pub unspent_first: bool,
    pub page_size: usize,
    pub page_token: Option<String>,
}

impl Default for UtxoQuery {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            include_spent: false,
            asset_id: None,
            min_amount: None,
            block_timestamp: None,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            unspent_first: false,
            page_size: DEFAULT_PAGE_SIZE,
            page_token: None,
        }
    }
}

/// A record joined with its spend info, ready for response shaping. For
/// staked records the consumption metadata is already stripped: it must not
/// reach any serialized response.
#[derive(Debug, Clone)]
pub struct ListedUtxo {
    pub utxo: StoredUtxo,
    pub spend: Option<SpendInfo>,
}

#[derive(Debug, Clone)]
pub struct UtxoPage {
    pub items: Vec<ListedUtxo>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid page token")]
    InvalidPageToken,

    #[error("invalid amount filter")]
    InvalidAmount,

    #[error("corrupt amount on utxo {0}")]
    CorruptAmount(UtxoId),
}

pub fn encode_page_token(offset: usize) -> String {
    B64.encode(offset.to_string())
}

pub fn decode_page_token(token: &str) -> Result<usize, QueryError> {
    let raw = B64.decode(token).map_err(|_| QueryError::InvalidPageToken)?;
    let text = String::from_utf8(raw).map_err(|_| QueryError::InvalidPageToken)?;
    text.parse().map_err(|_| QueryError::InvalidPageToken)
}

/// Union of candidates across the queried addresses, joined with spend info
/// and filtered by the M-of-N overlap rule.
pub(crate) fn load_candidates<S: UtxoStore>(
    store: &S,
    chain: ChainTag,
    addresses: &[String],
) -> Result<Vec<(StoredUtxo, Option<SpendInfo>)>, QueryError> {
    let mut ids = BTreeSet::new();

    for address in addresses {
        for id in store.by_address(chain, address)? {
            ids.insert(id);
        }
    }

    let mut out = Vec::with_capacity(ids.len());

    for id in ids {
        // index entries can race ahead of the record within a batch replay;
        // an absent record is simply not listable yet
        let Some(utxo) = store.get_utxo(chain, &id)? else {
            continue;
        };

        let spend = store.get_spend(chain, &id)?;
        out.push((utxo, spend));
    }

    Ok(out)
}

pub(crate) fn threshold_met(utxo: &StoredUtxo, addresses: &[String]) -> bool {
    let overlap = utxo
        .addresses
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|owned| addresses.iter().any(|a| a == *owned))
        .count() as u32;

    overlap >= utxo.threshold.unwrap_or(1).max(1)
}

fn parse_amount(utxo: &StoredUtxo) -> Result<BigUint, QueryError> {
    match utxo.amount.as_deref() {
        None => Ok(BigUint::default()),
        Some(text) => text
            .parse()
            .map_err(|_| QueryError::CorruptAmount(utxo.utxo_id)),
    }
}

/// Whether the record behaves as spent at `at`. Staking principal is
/// returned, not consumed: an actively staked record is always unspent, an
/// ended stake is history.
pub(crate) fn effectively_spent(
    utxo: &StoredUtxo,
    spend: Option<&SpendInfo>,
    at: UnixTime,
) -> bool {
    if utxo.staked == Some(true) {
        return utxo.stake_end.map(|end| end <= at).unwrap_or(false);
    }

    spend.is_some()
}

pub fn list_utxos<S: UtxoStore>(
    store: &S,
    chain: ChainTag,
    query: &UtxoQuery,
    now: UnixTime,
) -> Result<UtxoPage, QueryError> {
    let min_amount: Option<BigUint> = match query.min_amount.as_deref() {
        None => None,
        Some(text) => Some(text.parse().map_err(|_| QueryError::InvalidAmount)?),
    };

    let eval_time = query.block_timestamp.unwrap_or(now);

    let mut rows = Vec::new();

    for (utxo, spend) in load_candidates(store, chain, &query.addresses)? {
        if !threshold_met(&utxo, &query.addresses) {
            continue;
        }

        if let Some(asset) = &query.asset_id {
            if utxo.asset_id.as_ref() != Some(asset) {
                continue;
            }
        }

        let amount = parse_amount(&utxo)?;
        if let Some(min) = &min_amount {
            if amount < *min {
                continue;
            }
        }

        if let Some(t) = query.block_timestamp {
            // strict bounds on both edges of the lifetime
            let created_before = utxo.block_timestamp.map(|c| c < t).unwrap_or(false);
            if !created_before {
                continue;
            }

            if let Some(info) = &spend {
                if info.consuming_time <= t {
                    continue;
                }
            }

            if utxo.staked == Some(true) && utxo.stake_end.map(|e| e <= t).unwrap_or(false) {
                continue;
            }
        } else if !query.include_spent && effectively_spent(&utxo, spend.as_ref(), eval_time) {
            continue;
        }

        let spent_flag = effectively_spent(&utxo, spend.as_ref(), eval_time);
        rows.push((spent_flag, amount, utxo, spend));
    }

    rows.sort_by(|a, b| {
        if query.unspent_first {
            let partition = a.0.cmp(&b.0);
            if partition != std::cmp::Ordering::Equal {
                return partition;
            }
        }

        let primary = match query.sort_by {
            SortBy::Timestamp => a
                .2
                .block_timestamp
                .unwrap_or_default()
                .cmp(&b.2.block_timestamp.unwrap_or_default()),
            SortBy::Amount => a.1.cmp(&b.1),
        };

        // tie-break on utxo id, same direction as the primary sort
        let ordering = primary.then_with(|| a.2.utxo_id.cmp(&b.2.utxo_id));

        match query.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    let page_size = query.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);

    let offset = match query.page_token.as_deref() {
        None => 0,
        Some(token) => decode_page_token(token)?,
    };

    let total = rows.len();

    let items = rows
        .into_iter()
        .skip(offset)
        .take(page_size)
        .map(|(_, _, utxo, spend)| {
            // staked records never expose consumption metadata
            let spend = if utxo.staked == Some(true) { None } else { spend };
            ListedUtxo { utxo, spend }
        })
        .collect::<Vec<_>>();

    let consumed = offset + items.len();
    let next_page_token = (consumed < total).then(|| encode_page_token(consumed));

    Ok(UtxoPage {
        items,
        next_page_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_token_roundtrip() {
        for offset in [0usize, 1, 10, 12345] {
            let token = encode_page_token(offset);
            assert_eq!(decode_page_token(&token).unwrap(), offset);
        }
    }

    #[test]
    fn page_token_rejects_garbage() {
        assert!(decode_page_token("!!!").is_err());
        let not_a_number = B64.encode("ten");
        assert!(decode_page_token(&not_a_number).is_err());
    }

    #[test]
    fn threshold_counts_overlap() {
        let mut utxo = StoredUtxo::default();
        utxo.addresses = Some(vec!["a".into(), "b".into(), "c".into()]);
        utxo.threshold = Some(2);

        assert!(threshold_met(&utxo, &["a".into(), "b".into()]));
        assert!(threshold_met(&utxo, &["a".into(), "c".into(), "z".into()]));
        assert!(!threshold_met(&utxo, &["a".into()]));
        assert!(!threshold_met(&utxo, &["z".into()]));
    }

    #[test]
    fn staked_records_follow_the_stake_clock() {
        let mut utxo = StoredUtxo::default();
        utxo.staked = Some(true);
        utxo.stake_end = Some(10_500);

        let spend = None;
        assert!(!effectively_spent(&utxo, spend, 10_400));
        assert!(effectively_spent(&utxo, spend, 10_500));
        assert!(effectively_spent(&utxo, spend, 10_600));
    }
}
