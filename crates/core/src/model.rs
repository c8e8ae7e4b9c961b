//! Persisted records shared by the indexing engine, the storage layer and
//! the query surface.

use serde::{Deserialize, Serialize};

use crate::{
    ids::{AssetId, ChainId, Id32, TxId, UtxoId},
    BlockHeight, OutputIndex, UnixTime,
};

/// The output flavor, as exposed by the query surface. Chains disagree on
/// casing; the record stores the neutral form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtxoKind {
    Transfer,
    Stake,
    StakeableLock,
    Mint,
    NftTransfer,
}

impl UtxoKind {
    pub fn upper(&self) -> &'static str {
        match self {
            UtxoKind::Transfer => "TRANSFER",
            UtxoKind::Stake => "STAKE",
            UtxoKind::StakeableLock => "STAKEABLE_LOCK",
            UtxoKind::Mint => "MINT",
            UtxoKind::NftTransfer => "NFT_TRANSFER",
        }
    }

    pub fn lower(&self) -> &'static str {
        match self {
            UtxoKind::Transfer => "transfer",
            UtxoKind::Stake => "stake",
            UtxoKind::StakeableLock => "stakeable_lock",
            UtxoKind::Mint => "mint",
            UtxoKind::NftTransfer => "nft_transfer",
        }
    }
}

/// A signature over the unsigned tx bytes together with the recovered
/// public key, when recovery succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub signature: Vec<u8>,
    pub public_key: Option<Vec<u8>>,
}

/// The stored UTXO record for one chain partition.
///
/// Cross-chain UTXOs are written by either side (source export, destination
/// import) in any order, so every creation-side field is optional and records
/// may be partial until both sides have been indexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredUtxo {
    pub utxo_id: UtxoId,

    pub tx_id: Option<TxId>,
    pub output_index: Option<OutputIndex>,

    pub asset_id: Option<AssetId>,
    /// Decimal digits; arbitrary precision. Never a float.
    pub amount: Option<String>,

    pub addresses: Option<Vec<String>>,
    pub threshold: Option<u32>,

    pub kind: Option<UtxoKind>,

    pub platform_locktime: Option<UnixTime>,
    pub stakeable_locktime: Option<UnixTime>,

    pub staked: Option<bool>,
    pub stake_start: Option<UnixTime>,
    pub stake_end: Option<UnixTime>,
    pub is_reward: Option<bool>,
    pub node_id: Option<String>,
    pub reward_addresses: Option<Vec<String>>,

    pub created_on_chain: Option<ChainId>,
    pub consumed_on_chain: Option<ChainId>,

    pub block_number: Option<BlockHeight>,
    pub block_timestamp: Option<UnixTime>,
    /// Creation coords above were filled from the consuming side and may be
    /// replaced by real source-chain data.
    pub creation_is_fallback: bool,

    pub utxo_bytes: Option<Vec<u8>>,

    pub payload: Option<Vec<u8>>,
    pub group_id: Option<u32>,

    pub fx_id: Option<Id32>,

    pub credentials: Option<Vec<Credential>>,
}

/// A partial update applied through `upsert`. Only `Some` fields land on the
/// stored record; this is the sole admissible write path for creation data of
/// any UTXO that more than one chain can contribute to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtxoUpdate {
    pub tx_id: Option<TxId>,
    pub output_index: Option<OutputIndex>,
    pub asset_id: Option<AssetId>,
    pub amount: Option<String>,
    pub addresses: Option<Vec<String>>,
    pub threshold: Option<u32>,
    pub kind: Option<UtxoKind>,
    pub platform_locktime: Option<UnixTime>,
    pub stakeable_locktime: Option<UnixTime>,
    pub staked: Option<bool>,
    pub stake_start: Option<UnixTime>,
    pub stake_end: Option<UnixTime>,
    pub is_reward: Option<bool>,
    pub node_id: Option<String>,
    pub reward_addresses: Option<Vec<String>>,
    pub created_on_chain: Option<ChainId>,
    pub consumed_on_chain: Option<ChainId>,
    pub block_number: Option<BlockHeight>,
    pub block_timestamp: Option<UnixTime>,
    pub utxo_bytes: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
    pub group_id: Option<u32>,
    pub fx_id: Option<Id32>,
    pub credentials: Option<Vec<Credential>>,

    /// When set, creation coords (`block_number`, `block_timestamp`) are only
    /// applied if the record has none. This is how an ImportTx that races
    /// ahead of the source chain fills coords without clobbering the source
    /// chain's truth once it arrives.
    pub creation_is_fallback: bool,
}

impl StoredUtxo {
    pub fn new(utxo_id: UtxoId) -> Self {
        Self {
            utxo_id,
            ..Default::default()
        }
    }

    /// Merge `update` onto this record, field by field.
    ///
    /// Commutative for disjoint field sets and idempotent for repeated
    /// identical inputs, across any interleaving of the export-side and
    /// import-side writes for the same utxo id.
    pub fn merge(&mut self, update: UtxoUpdate) {
        macro_rules! take {
            ($field:ident) => {
                if update.$field.is_some() {
                    self.$field = update.$field;
                }
            };
        }

        take!(tx_id);
        take!(output_index);
        take!(asset_id);
        take!(amount);
        take!(addresses);
        take!(threshold);
        take!(kind);
        take!(platform_locktime);
        take!(stakeable_locktime);
        take!(staked);
        take!(stake_start);
        take!(stake_end);
        take!(is_reward);
        take!(node_id);
        take!(reward_addresses);
        take!(created_on_chain);
        take!(consumed_on_chain);
        take!(utxo_bytes);
        take!(payload);
        take!(group_id);
        take!(fx_id);
        take!(credentials);

        if update.creation_is_fallback {
            if self.block_number.is_none() {
                self.block_number = update.block_number;
                self.creation_is_fallback = update.block_number.is_some();
            }
            if self.block_timestamp.is_none() {
                self.block_timestamp = update.block_timestamp;
            }
        } else {
            if update.block_number.is_some() {
                self.block_number = update.block_number;
                self.creation_is_fallback = false;
            }
            if update.block_timestamp.is_some() {
                self.block_timestamp = update.block_timestamp;
            }
        }
    }

    /// Whether the source chain has contributed real creation coords.
    pub fn has_creation_data(&self) -> bool {
        self.block_number.is_some() && !self.creation_is_fallback
    }
}

/// One row of the write-only spend index.
///
/// Appended (or overwritten) under the consuming chain's prefix; joined with
/// the UTXO record at query time. Kept separate so cross-chain consumption is
/// a single write with no read-modify-write cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendInfo {
    pub consuming_tx: TxId,
    pub consuming_time: UnixTime,
    pub consuming_block_number: BlockHeight,
    pub consumed_on_chain: ChainId,
    pub credentials: Option<Vec<Credential>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub asset_id: AssetId,
    pub name: String,
    pub symbol: String,
    pub denomination: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> Id32 {
        Id32([byte; 32])
    }

    fn export_side() -> UtxoUpdate {
        UtxoUpdate {
            tx_id: Some(id(1)),
            output_index: Some(0),
            asset_id: Some(id(2)),
            amount: Some("5000000".into()),
            addresses: Some(vec!["P-avax1xyz".into()]),
            threshold: Some(1),
            kind: Some(UtxoKind::Transfer),
            created_on_chain: Some(id(3)),
            consumed_on_chain: Some(id(4)),
            block_number: Some(48_746_327),
            block_timestamp: Some(1_765_267_096),
            utxo_bytes: Some(vec![0xAA, 0xBB]),
            ..Default::default()
        }
    }

    fn import_side_fallback() -> UtxoUpdate {
        UtxoUpdate {
            consumed_on_chain: Some(id(4)),
            block_number: Some(250_286),
            block_timestamp: Some(1_765_267_108),
            creation_is_fallback: true,
            ..Default::default()
        }
    }

    #[test]
    fn merge_is_commutative_across_cross_chain_interleavings() {
        let mut a = StoredUtxo::new(id(9));
        a.merge(export_side());
        a.merge(import_side_fallback());

        let mut b = StoredUtxo::new(id(9));
        b.merge(import_side_fallback());
        b.merge(export_side());

        assert_eq!(a, b);
        // the source chain's coords win regardless of arrival order
        assert_eq!(a.block_number, Some(48_746_327));
        assert_eq!(a.block_timestamp, Some(1_765_267_096));
        assert!(a.has_creation_data());
    }

    #[test]
    fn merge_is_idempotent() {
        let mut once = StoredUtxo::new(id(9));
        once.merge(export_side());

        let mut twice = StoredUtxo::new(id(9));
        twice.merge(export_side());
        twice.merge(export_side());

        assert_eq!(once, twice);
    }

    #[test]
    fn fallback_fills_only_when_empty() {
        let mut utxo = StoredUtxo::new(id(9));
        utxo.merge(import_side_fallback());

        assert_eq!(utxo.block_number, Some(250_286));
        assert!(!utxo.has_creation_data());

        // a second fallback from a retry does not shift the coords
        let mut retry = import_side_fallback();
        retry.block_number = Some(999);
        utxo.merge(retry);
        assert_eq!(utxo.block_number, Some(250_286));
    }

    #[test]
    fn merge_keeps_unrelated_fields() {
        let mut utxo = StoredUtxo::new(id(9));
        utxo.merge(export_side());

        utxo.merge(UtxoUpdate {
            staked: Some(true),
            ..Default::default()
        });

        assert_eq!(utxo.amount.as_deref(), Some("5000000"));
        assert_eq!(utxo.staked, Some(true));
    }
}
