//! Validator indexer: static staking facts by subnet and by node.
//!
//! Live fields (uptime, delegation capacity, potential rewards) are merged
//! in at query time from the node; nothing volatile is persisted here.

use serde::{Deserialize, Serialize};

use serac_core::{
    bucket_watermark, watermark_write, BlockHeight, BlockIndexer, BucketWrite, Id32, IndexError,
    KvBucket, TxId, UnixTime,
};

use crate::model::{PBlock, PTransaction, StakeKind, SubnetAction};
use crate::rpc::LiveValidator;

use super::{codec_err, rev_height};

const BY_SUBNET: &[u8] = b"s:";
const BY_NODE: &[u8] = b"n:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    Validator,
    PermissionlessValidator,
    Delegator,
    PermissionlessDelegator,
    SubnetValidator,
    L1Validator,
}

impl From<StakeKind> for ValidatorKind {
    fn from(value: StakeKind) -> Self {
        match value {
            StakeKind::Validator => ValidatorKind::Validator,
            StakeKind::PermissionlessValidator => ValidatorKind::PermissionlessValidator,
            StakeKind::Delegator => ValidatorKind::Delegator,
            StakeKind::PermissionlessDelegator => ValidatorKind::PermissionlessDelegator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    pub tx_hash: TxId,
    pub node_id: String,
    pub subnet_id: Id32,
    pub kind: ValidatorKind,
    pub start_time: UnixTime,
    pub end_time: UnixTime,
    /// Stake amount for primary-network txs, weight for subnet txs
    pub weight: u64,
    pub reward_addresses: Vec<String>,
    pub block_height: BlockHeight,
}

/// A record with live node data merged in, as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedValidator {
    #[serde(flatten)]
    pub record: ValidatorRecord,
    pub connected: Option<bool>,
    pub uptime_performance: Option<f64>,
    pub delegation_capacity: Option<u64>,
    pub potential_reward: Option<u64>,
}

#[derive(Clone)]
pub struct ValidatorIndexer<B: KvBucket> {
    bucket: B,
}

impl<B: KvBucket> ValidatorIndexer<B> {
    pub fn new(bucket: B) -> Self {
        Self { bucket }
    }

    fn push_record(entries: &mut Vec<BucketWrite>, record: &ValidatorRecord) -> Result<(), IndexError> {
        let encoded = bincode::serialize(record).map_err(codec_err)?;

        let mut by_subnet = BY_SUBNET.to_vec();
        by_subnet.extend_from_slice(record.subnet_id.as_bytes());
        by_subnet.extend_from_slice(&rev_height(record.block_height));
        by_subnet.extend_from_slice(record.tx_hash.as_bytes());
        entries.push((by_subnet, Some(encoded.clone())));

        let mut by_node = BY_NODE.to_vec();
        by_node.extend_from_slice(record.node_id.as_bytes());
        by_node.push(0);
        by_node.extend_from_slice(&rev_height(record.block_height));
        by_node.extend_from_slice(record.tx_hash.as_bytes());
        entries.push((by_node, Some(encoded)));

        Ok(())
    }

    /// Descending by block height; ties resolve on tx hash within a height.
    pub fn by_subnet(&self, subnet_id: &Id32, limit: usize) -> Result<Vec<ValidatorRecord>, IndexError> {
        let mut prefix = BY_SUBNET.to_vec();
        prefix.extend_from_slice(subnet_id.as_bytes());
        self.scan(&prefix, limit)
    }

    pub fn by_node(&self, node_id: &str, limit: usize) -> Result<Vec<ValidatorRecord>, IndexError> {
        let mut prefix = BY_NODE.to_vec();
        prefix.extend_from_slice(node_id.as_bytes());
        prefix.push(0);
        self.scan(&prefix, limit)
    }

    fn scan(&self, prefix: &[u8], limit: usize) -> Result<Vec<ValidatorRecord>, IndexError> {
        self.bucket
            .scan_prefix(prefix)?
            .into_iter()
            .take(limit)
            .map(|(_, value)| bincode::deserialize(&value).map_err(codec_err))
            .collect()
    }
}

/// Merge the live node view into indexed records.
pub fn enrich_validators(
    records: Vec<ValidatorRecord>,
    live: &[LiveValidator],
) -> Vec<EnrichedValidator> {
    records
        .into_iter()
        .map(|record| {
            let hit = live.iter().find(|v| v.node_id == record.node_id);

            EnrichedValidator {
                connected: hit.map(|v| v.connected),
                uptime_performance: hit.map(|v| v.uptime_performance),
                delegation_capacity: hit.map(|v| v.delegation_capacity),
                potential_reward: hit.map(|v| v.potential_reward),
                record,
            }
        })
        .collect()
}

impl<B: KvBucket> BlockIndexer<PBlock> for ValidatorIndexer<B> {
    fn name(&self) -> &'static str {
        "validators"
    }

    fn watermark(&self) -> Result<Option<BlockHeight>, IndexError> {
        Ok(bucket_watermark(&self.bucket)?)
    }

    fn process_batch(&self, blocks: &[PBlock]) -> Result<(), IndexError> {
        let Some(last) = blocks.last() else {
            return Ok(());
        };

        let mut entries = Vec::new();

        for block in blocks {
            for tx in &block.txs {
                match tx {
                    PTransaction::Stake {
                        base,
                        kind,
                        node_id,
                        stake_outs,
                        end_time,
                        reward_owner,
                        subnet_id,
                        ..
                    } => {
                        let weight = stake_outs
                            .iter()
                            .filter_map(|o| o.output.amount())
                            .sum::<u64>();

                        Self::push_record(
                            &mut entries,
                            &ValidatorRecord {
                                tx_hash: base.tx_id,
                                node_id: node_id.clone(),
                                subnet_id: subnet_id.unwrap_or_default(),
                                kind: (*kind).into(),
                                start_time: block.timestamp,
                                end_time: *end_time,
                                weight,
                                reward_addresses: reward_owner.addresses.clone(),
                                block_height: block.height,
                            },
                        )?;
                    }

                    PTransaction::SubnetAction { base, action } => match action {
                        SubnetAction::AddSubnetValidator {
                            subnet_id,
                            node_id,
                            start_time: _,
                            end_time,
                            weight,
                        } => {
                            Self::push_record(
                                &mut entries,
                                &ValidatorRecord {
                                    tx_hash: base.tx_id,
                                    node_id: node_id.clone(),
                                    subnet_id: *subnet_id,
                                    kind: ValidatorKind::SubnetValidator,
                                    start_time: block.timestamp,
                                    end_time: *end_time,
                                    weight: *weight,
                                    reward_addresses: vec![],
                                    block_height: block.height,
                                },
                            )?;
                        }

                        SubnetAction::RegisterSubnetValidator {
                            subnet_id,
                            node_id,
                            weight,
                            ..
                        } => {
                            Self::push_record(
                                &mut entries,
                                &ValidatorRecord {
                                    tx_hash: base.tx_id,
                                    node_id: node_id.clone(),
                                    subnet_id: *subnet_id,
                                    kind: ValidatorKind::L1Validator,
                                    start_time: block.timestamp,
                                    end_time: 0,
                                    weight: *weight,
                                    reward_addresses: vec![],
                                    block_height: block.height,
                                },
                            )?;
                        }

                        _ => {}
                    },

                    _ => {}
                }
            }
        }

        entries.push(watermark_write(last.height));
        self.bucket.write(&entries)?;

        Ok(())
    }
}
