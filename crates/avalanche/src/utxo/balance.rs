//! Balance aggregation over the indexed UTXO set.
//!
//! Buckets are assigned per chain from the record's lock fields, the stake
//! clock and the cross-chain topology at the evaluation time. All sums run
//! over arbitrary-precision integers; a record with an unparseable amount is
//! a fatal integrity error, not a silently dropped value.

use std::collections::BTreeMap;

use num_bigint::BigUint;

use serac_core::{AssetId, ChainId, ChainTag, NetworkParams, SpendInfo, StoredUtxo, UnixTime, UtxoStore};

use super::query::{load_candidates, threshold_met, QueryError};

/// Per-asset totals within one bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals(pub BTreeMap<AssetId, BigUint>);

impl Totals {
    fn add(&mut self, asset: AssetId, amount: &BigUint) {
        *self.0.entry(asset).or_default() += amount;
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-asset totals keyed by the counterparty chain of the shared-memory
/// region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedTotals(pub BTreeMap<(AssetId, ChainId), BigUint>);

impl SharedTotals {
    fn add(&mut self, asset: AssetId, shared_with: ChainId, amount: &BigUint) {
        *self.0.entry((asset, shared_with)).or_default() += amount;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformBalances {
    pub unlocked_unstaked: Totals,
    pub unlocked_staked: Totals,
    pub locked_platform: Totals,
    pub locked_stakeable: Totals,
    pub locked_staked: Totals,
    pub pending_staked: Totals,
    pub atomic_memory_unlocked: SharedTotals,
    pub atomic_memory_locked: SharedTotals,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeBalances {
    pub locked: Totals,
    pub unlocked: Totals,
    pub atomic_memory_unlocked: SharedTotals,
    pub atomic_memory_locked: SharedTotals,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractBalances {
    pub atomic_memory_unlocked: SharedTotals,
    pub atomic_memory_locked: SharedTotals,
}

struct Candidate {
    asset: AssetId,
    amount: BigUint,
    utxo: StoredUtxo,
    spend: Option<SpendInfo>,
}

fn gather<S: UtxoStore>(
    store: &S,
    chain: ChainTag,
    addresses: &[String],
    at: UnixTime,
    historical: bool,
) -> Result<Vec<Candidate>, QueryError> {
    let mut out = Vec::new();

    for (utxo, spend) in load_candidates(store, chain, addresses)? {
        if !threshold_met(&utxo, addresses) {
            continue;
        }

        if historical {
            let created_before = utxo.block_timestamp.map(|c| c < at).unwrap_or(false);
            if !created_before {
                continue;
            }
        }

        let Some(asset) = utxo.asset_id else {
            continue;
        };

        let amount: BigUint = match utxo.amount.as_deref() {
            None => continue,
            Some(text) => text
                .parse()
                .map_err(|_| QueryError::CorruptAmount(utxo.utxo_id))?,
        };

        out.push(Candidate {
            asset,
            amount,
            utxo,
            spend,
        });
    }

    Ok(out)
}

fn spent_at(candidate: &Candidate, at: UnixTime, historical: bool) -> bool {
    match &candidate.spend {
        None => false,
        Some(info) => {
            if historical {
                info.consuming_time <= at
            } else {
                true
            }
        }
    }
}

fn cross_chain(utxo: &StoredUtxo) -> Option<(ChainId, ChainId)> {
    match (utxo.created_on_chain, utxo.consumed_on_chain) {
        (Some(created), Some(consumed)) if created != consumed => Some((created, consumed)),
        _ => None,
    }
}

fn shared_counterparty(utxo: &StoredUtxo, own: ChainId) -> Option<ChainId> {
    let (created, consumed) = cross_chain(utxo)?;
    if created == own {
        Some(consumed)
    } else {
        Some(created)
    }
}

fn locked_at(utxo: &StoredUtxo, at: UnixTime) -> bool {
    utxo.platform_locktime.map(|l| l > at).unwrap_or(false)
}

fn stakeable_locked_at(utxo: &StoredUtxo, at: UnixTime) -> bool {
    utxo.stakeable_locktime.map(|l| l > at).unwrap_or(false)
}

/// P-chain bucket assignment. `at` is the evaluation time: now for current
/// balances, the caller's `blockTimestamp` for historical ones.
pub fn platform_balances<S: UtxoStore>(
    store: &S,
    params: &NetworkParams,
    addresses: &[String],
    at: UnixTime,
    historical: bool,
) -> Result<PlatformBalances, QueryError> {
    let mut balances = PlatformBalances::default();
    let own = params.p_chain_id;

    for candidate in gather(store, ChainTag::Platform, addresses, at, historical)? {
        let utxo = &candidate.utxo;

        if utxo.staked == Some(true) {
            let start = utxo.stake_start.unwrap_or_default();
            let end = utxo.stake_end.unwrap_or(u64::MAX);

            if start > at {
                balances.pending_staked.add(candidate.asset, &candidate.amount);
            } else if end > at {
                // the stake period itself locks the principal until end time
                balances.locked_staked.add(candidate.asset, &candidate.amount);
            } else {
                // the stake ended: the principal was returned and counts as
                // liquid again, subject to any remaining locks
                if locked_at(utxo, at) {
                    balances.locked_platform.add(candidate.asset, &candidate.amount);
                } else if stakeable_locked_at(utxo, at) {
                    balances.locked_stakeable.add(candidate.asset, &candidate.amount);
                } else {
                    balances.unlocked_unstaked.add(candidate.asset, &candidate.amount);
                }
            }

            continue;
        }

        if spent_at(&candidate, at, historical) {
            continue;
        }

        if let Some(shared_with) = shared_counterparty(utxo, own) {
            if locked_at(utxo, at) {
                balances
                    .atomic_memory_locked
                    .add(candidate.asset, shared_with, &candidate.amount);
            } else {
                balances
                    .atomic_memory_unlocked
                    .add(candidate.asset, shared_with, &candidate.amount);
            }
            continue;
        }

        if locked_at(utxo, at) {
            balances.locked_platform.add(candidate.asset, &candidate.amount);
        } else if stakeable_locked_at(utxo, at) {
            balances.locked_stakeable.add(candidate.asset, &candidate.amount);
        } else {
            balances.unlocked_unstaked.add(candidate.asset, &candidate.amount);
        }
    }

    Ok(balances)
}

pub fn exchange_balances<S: UtxoStore>(
    store: &S,
    params: &NetworkParams,
    addresses: &[String],
    at: UnixTime,
    historical: bool,
) -> Result<ExchangeBalances, QueryError> {
    let mut balances = ExchangeBalances::default();
    let own = params.x_chain_id;

    for candidate in gather(store, ChainTag::Exchange, addresses, at, historical)? {
        if spent_at(&candidate, at, historical) {
            continue;
        }

        let utxo = &candidate.utxo;

        if let Some(shared_with) = shared_counterparty(utxo, own) {
            if locked_at(utxo, at) {
                balances
                    .atomic_memory_locked
                    .add(candidate.asset, shared_with, &candidate.amount);
            } else {
                balances
                    .atomic_memory_unlocked
                    .add(candidate.asset, shared_with, &candidate.amount);
            }
            continue;
        }

        if locked_at(utxo, at) {
            balances.locked.add(candidate.asset, &candidate.amount);
        } else {
            balances.unlocked.add(candidate.asset, &candidate.amount);
        }
    }

    Ok(balances)
}

/// C-chain balances cover only the shared-memory UTXOs; EVM account state is
/// out of scope.
pub fn contract_balances<S: UtxoStore>(
    store: &S,
    params: &NetworkParams,
    addresses: &[String],
    at: UnixTime,
    historical: bool,
) -> Result<ContractBalances, QueryError> {
    let mut balances = ContractBalances::default();
    let own = params.c_chain_id;

    for candidate in gather(store, ChainTag::Contract, addresses, at, historical)? {
        if spent_at(&candidate, at, historical) {
            continue;
        }

        let Some(shared_with) = shared_counterparty(&candidate.utxo, own) else {
            continue;
        };

        if locked_at(&candidate.utxo, at) {
            balances
                .atomic_memory_locked
                .add(candidate.asset, shared_with, &candidate.amount);
        } else {
            balances
                .atomic_memory_unlocked
                .add(candidate.asset, shared_with, &candidate.amount);
        }
    }

    Ok(balances)
}
