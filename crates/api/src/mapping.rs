//! Response shaping. Field names, casing and types diverge by chain and are
//! part of the API contract; they are spelled out here and nowhere else.

use serde::Serialize;

use serac_avalanche::model::with_checksum;
use serac_avalanche::utxo::{
    ContractBalances, ExchangeBalances, ListedUtxo, PlatformBalances, SharedTotals, Totals,
};
use serac_core::{ChainTag, Credential, StoredUtxo};

fn hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn utxo_bytes_field(utxo: &StoredUtxo) -> Option<String> {
    utxo.utxo_bytes
        .as_deref()
        .map(|raw| hex_bytes(&with_checksum(raw)))
}

fn is_cross_chain(utxo: &StoredUtxo) -> bool {
    match (utxo.created_on_chain, utxo.consumed_on_chain) {
        (Some(created), Some(consumed)) => created != consumed,
        _ => false,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformUtxo {
    pub utxo_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    pub addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utxo_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_locktime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stakeable_locktime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stake_start_timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stake_end_timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_reward: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_addresses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_on_chain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_on_chain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utxo_bytes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consuming_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consuming_block_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consuming_block_timestamp: Option<u64>,
}

impl From<&ListedUtxo> for PlatformUtxo {
    fn from(listed: &ListedUtxo) -> Self {
        let utxo = &listed.utxo;

        // locktime is meaningless across the shared-memory boundary
        let platform_locktime = if is_cross_chain(utxo) {
            None
        } else {
            utxo.platform_locktime.filter(|l| *l > 0)
        };

        // staked records never carry consumption metadata; the query layer
        // already strips it, this only shapes what is left
        let spend = listed.spend.as_ref();

        Self {
            utxo_id: utxo.utxo_id.to_string(),
            tx_hash: utxo.tx_id.map(|id| id.to_string()),
            output_index: utxo.output_index,
            block_number: utxo.block_number.map(|n| n.to_string()),
            block_timestamp: utxo.block_timestamp,
            asset_id: utxo.asset_id.map(|id| id.to_string()),
            amount: utxo.amount.clone(),
            addresses: utxo.addresses.clone().unwrap_or_default(),
            threshold: utxo.threshold,
            utxo_type: utxo.kind.map(|k| k.upper()),
            platform_locktime,
            stakeable_locktime: utxo.stakeable_locktime.filter(|l| *l > 0),
            staked: utxo.staked,
            stake_start_timestamp: utxo.stake_start,
            stake_end_timestamp: utxo.stake_end,
            is_reward: utxo.is_reward,
            node_id: utxo.node_id.clone(),
            reward_addresses: utxo.reward_addresses.clone(),
            created_on_chain_id: utxo.created_on_chain.map(|id| id.to_string()),
            consumed_on_chain_id: utxo.consumed_on_chain.map(|id| id.to_string()),
            utxo_bytes: utxo_bytes_field(utxo),
            consuming_tx_hash: spend.map(|s| s.consuming_tx.to_string()),
            consuming_block_number: spend.map(|s| s.consuming_block_number.to_string()),
            consuming_block_timestamp: spend.map(|s| s.consuming_time),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialView {
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl From<&Credential> for CredentialView {
    fn from(value: &Credential) -> Self {
        Self {
            signature: hex_bytes(&value.signature),
            public_key: value.public_key.as_deref().map(hex_bytes),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeUtxo {
    pub utxo_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    pub addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utxo_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locktime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_on_chain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_on_chain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utxo_bytes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Vec<CredentialView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consuming_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consuming_tx_timestamp: Option<u64>,
}

impl From<&ListedUtxo> for ExchangeUtxo {
    fn from(listed: &ListedUtxo) -> Self {
        let utxo = &listed.utxo;
        let spend = listed.spend.as_ref();

        let credentials = utxo
            .credentials
            .as_deref()
            .map(|creds| creds.iter().map(CredentialView::from).collect::<Vec<_>>())
            .filter(|c: &Vec<_>| !c.is_empty());

        Self {
            utxo_id: utxo.utxo_id.to_string(),
            creation_tx_hash: utxo.tx_id.map(|id| id.to_string()),
            output_index: utxo.output_index.map(|i| i.to_string()),
            timestamp: utxo.block_timestamp,
            block_number: utxo.block_number.map(|n| n.to_string()),
            asset_id: utxo.asset_id.map(|id| id.to_string()),
            amount: utxo.amount.clone(),
            addresses: utxo.addresses.clone().unwrap_or_default(),
            threshold: utxo.threshold,
            utxo_type: utxo.kind.map(|k| k.lower()),
            locktime: utxo.platform_locktime,
            group_id: utxo.group_id,
            payload: utxo.payload.as_deref().map(hex_bytes),
            created_on_chain_id: utxo.created_on_chain.map(|id| id.to_string()),
            consumed_on_chain_id: utxo.consumed_on_chain.map(|id| id.to_string()),
            utxo_bytes: utxo_bytes_field(utxo),
            credentials,
            consuming_tx_hash: spend.map(|s| s.consuming_tx.to_string()),
            consuming_tx_timestamp: spend.map(|s| s.consuming_time),
        }
    }
}

/// One listing entry, shaped for the chain it was requested on.
pub fn shape_utxo(listed: &ListedUtxo, chain: ChainTag) -> serde_json::Value {
    match chain {
        ChainTag::Platform => serde_json::to_value(PlatformUtxo::from(listed)),
        ChainTag::Exchange | ChainTag::Contract => {
            serde_json::to_value(ExchangeUtxo::from(listed))
        }
    }
    .unwrap_or_default()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAmount {
    pub asset_id: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedAssetAmount {
    pub asset_id: String,
    pub amount: String,
    pub shared_with_chain_id: String,
}

pub fn shape_totals(totals: &Totals) -> Vec<AssetAmount> {
    totals
        .0
        .iter()
        .map(|(asset, amount)| AssetAmount {
            asset_id: asset.to_string(),
            amount: amount.to_string(),
        })
        .collect()
}

pub fn shape_shared(totals: &SharedTotals) -> Vec<SharedAssetAmount> {
    totals
        .0
        .iter()
        .map(|((asset, shared_with), amount)| SharedAssetAmount {
            asset_id: asset.to_string(),
            amount: amount.to_string(),
            shared_with_chain_id: shared_with.to_string(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformBalancesView {
    pub unlocked_unstaked: Vec<AssetAmount>,
    pub unlocked_staked: Vec<AssetAmount>,
    pub locked_platform: Vec<AssetAmount>,
    pub locked_stakeable: Vec<AssetAmount>,
    pub locked_staked: Vec<AssetAmount>,
    pub pending_staked: Vec<AssetAmount>,
    pub atomic_memory_unlocked: Vec<SharedAssetAmount>,
    pub atomic_memory_locked: Vec<SharedAssetAmount>,
}

impl From<&PlatformBalances> for PlatformBalancesView {
    fn from(value: &PlatformBalances) -> Self {
        Self {
            unlocked_unstaked: shape_totals(&value.unlocked_unstaked),
            unlocked_staked: shape_totals(&value.unlocked_staked),
            locked_platform: shape_totals(&value.locked_platform),
            locked_stakeable: shape_totals(&value.locked_stakeable),
            locked_staked: shape_totals(&value.locked_staked),
            pending_staked: shape_totals(&value.pending_staked),
            atomic_memory_unlocked: shape_shared(&value.atomic_memory_unlocked),
            atomic_memory_locked: shape_shared(&value.atomic_memory_locked),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeBalancesView {
    pub locked: Vec<AssetAmount>,
    pub unlocked: Vec<AssetAmount>,
    pub atomic_memory_unlocked: Vec<SharedAssetAmount>,
    pub atomic_memory_locked: Vec<SharedAssetAmount>,
}

impl From<&ExchangeBalances> for ExchangeBalancesView {
    fn from(value: &ExchangeBalances) -> Self {
        Self {
            locked: shape_totals(&value.locked),
            unlocked: shape_totals(&value.unlocked),
            atomic_memory_unlocked: shape_shared(&value.atomic_memory_unlocked),
            atomic_memory_locked: shape_shared(&value.atomic_memory_locked),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractBalancesView {
    pub atomic_memory_unlocked: Vec<SharedAssetAmount>,
    pub atomic_memory_locked: Vec<SharedAssetAmount>,
}

impl From<&ContractBalances> for ContractBalancesView {
    fn from(value: &ContractBalances) -> Self {
        Self {
            atomic_memory_unlocked: shape_shared(&value.atomic_memory_unlocked),
            atomic_memory_locked: shape_shared(&value.atomic_memory_locked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serac_core::{Id32, SpendInfo, UtxoKind};

    fn base_utxo() -> StoredUtxo {
        let mut utxo = StoredUtxo::new(Id32([1; 32]));
        utxo.tx_id = Some(Id32([2; 32]));
        utxo.output_index = Some(0);
        utxo.amount = Some("1000000".into());
        utxo.addresses = Some(vec!["P-avax1abc".into()]);
        utxo.threshold = Some(1);
        utxo.kind = Some(UtxoKind::Transfer);
        utxo.platform_locktime = Some(9_999);
        utxo.block_number = Some(10);
        utxo.block_timestamp = Some(1500);
        utxo.created_on_chain = Some(Id32::default());
        utxo.consumed_on_chain = Some(Id32::default());
        utxo
    }

    #[test]
    fn platform_shape_uses_upper_case_and_numeric_index() {
        let listed = ListedUtxo {
            utxo: base_utxo(),
            spend: None,
        };

        let value = shape_utxo(&listed, ChainTag::Platform);

        assert_eq!(value["utxoType"], "TRANSFER");
        assert_eq!(value["outputIndex"], 0);
        assert_eq!(value["blockNumber"], "10");
        assert_eq!(value["blockTimestamp"], 1500);
        assert_eq!(value["txHash"], Id32([2; 32]).to_string());
        assert_eq!(value["platformLocktime"], 9_999);
        assert!(value.get("timestamp").is_none());
        assert!(value.get("creationTxHash").is_none());
    }

    #[test]
    fn exchange_shape_uses_lower_case_and_string_index() {
        let listed = ListedUtxo {
            utxo: base_utxo(),
            spend: None,
        };

        let value = shape_utxo(&listed, ChainTag::Exchange);

        assert_eq!(value["utxoType"], "transfer");
        assert_eq!(value["outputIndex"], "0");
        assert_eq!(value["timestamp"], 1500);
        assert_eq!(value["locktime"], 9_999);
        assert!(value.get("txHash").is_none());
        assert!(value.get("platformLocktime").is_none());
    }

    #[test]
    fn platform_locktime_is_omitted_for_cross_chain_records() {
        let mut utxo = base_utxo();
        utxo.created_on_chain = Some(Id32([0xCC; 32]));
        utxo.consumed_on_chain = Some(Id32::default());

        let listed = ListedUtxo { utxo, spend: None };
        let value = shape_utxo(&listed, ChainTag::Platform);

        assert!(value.get("platformLocktime").is_none());
    }

    #[test]
    fn consuming_fields_are_chain_specific() {
        let spend = SpendInfo {
            consuming_tx: Id32([3; 32]),
            consuming_time: 1_765_267_108,
            consuming_block_number: 250_286,
            consumed_on_chain: Id32::default(),
            credentials: None,
        };

        let listed = ListedUtxo {
            utxo: base_utxo(),
            spend: Some(spend),
        };

        let p = shape_utxo(&listed, ChainTag::Platform);
        assert_eq!(p["consumingBlockTimestamp"], 1_765_267_108u64);
        assert_eq!(p["consumingBlockNumber"], "250286");
        assert!(p.get("consumingTxTimestamp").is_none());

        let x = shape_utxo(&listed, ChainTag::Exchange);
        assert_eq!(x["consumingTxTimestamp"], 1_765_267_108u64);
        assert!(x.get("consumingBlockTimestamp").is_none());
    }

    #[test]
    fn utxo_bytes_carry_the_checksum_tail() {
        let mut utxo = base_utxo();
        utxo.utxo_bytes = Some(vec![0xAB, 0xCD]);

        let listed = ListedUtxo { utxo, spend: None };
        let value = shape_utxo(&listed, ChainTag::Platform);

        let text = value["utxoBytes"].as_str().unwrap();
        // 2 payload bytes + 4 checksum bytes, hex encoded with 0x prefix
        assert_eq!(text.len(), 2 + 12);
        assert!(text.starts_with("0xabcd"));
    }
}
