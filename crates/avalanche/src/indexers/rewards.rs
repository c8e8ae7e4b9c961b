//! Historical rewards: staking outcomes joined with their reward UTXOs.

use serde::{Deserialize, Serialize};

use serac_core::{
    bucket_watermark, watermark_write, BlockHeight, BlockIndexer, BucketWrite, IndexError,
    KvBucket, TxId, UnixTime,
};

use crate::model::{PBlock, PTransaction};

use super::{codec_err, rev_height};

const BY_ADDRESS: &[u8] = b"a:";
const BY_STAKING_TX: &[u8] = b"r:";

/// How many extra staking records to pull per page: some staking outcomes
/// produce zero reward UTXOs, so a page of rewards can span more stakes than
/// its own size.
pub const OVER_FETCH_FACTOR: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingRecord {
    pub staking_tx: TxId,
    pub node_id: String,
    pub amount_staked: u64,
    pub start_time: UnixTime,
    pub end_time: UnixTime,
    pub reward_addresses: Vec<String>,
    pub block_height: BlockHeight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub staking_tx: TxId,
    pub reward_tx: TxId,
    pub amount: u64,
    pub utxo_count: u32,
    pub rewarded_at: UnixTime,
}

/// One staking outcome with its reward, as served by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardEntry {
    pub staking: StakingRecord,
    pub reward: RewardRecord,
}

#[derive(Clone)]
pub struct RewardIndexer<B: KvBucket> {
    bucket: B,
}

impl<B: KvBucket> RewardIndexer<B> {
    pub fn new(bucket: B) -> Self {
        Self { bucket }
    }

    fn staking_key(address: &str, end_time: UnixTime, staking_tx: &TxId) -> Vec<u8> {
        let mut key = BY_ADDRESS.to_vec();
        key.extend_from_slice(address.as_bytes());
        key.push(0);
        key.extend_from_slice(&rev_height(end_time));
        key.extend_from_slice(staking_tx.as_bytes());
        key
    }

    fn reward_key(staking_tx: &TxId) -> Vec<u8> {
        let mut key = BY_STAKING_TX.to_vec();
        key.extend_from_slice(staking_tx.as_bytes());
        key
    }

    pub fn reward_for(&self, staking_tx: &TxId) -> Result<Option<RewardRecord>, IndexError> {
        let Some(raw) = self.bucket.get(&Self::reward_key(staking_tx))? else {
            return Ok(None);
        };
        Ok(Some(bincode::deserialize(&raw).map_err(codec_err)?))
    }

    /// Rewards for one address, newest stake end first. Lazily joins reward
    /// records, over-fetching staking records because zero-reward outcomes
    /// contribute nothing to the page.
    pub fn rewards_for_address(
        &self,
        address: &str,
        page_size: usize,
    ) -> Result<Vec<RewardEntry>, IndexError> {
        let mut prefix = BY_ADDRESS.to_vec();
        prefix.extend_from_slice(address.as_bytes());
        prefix.push(0);

        let stakes = self.bucket.scan_prefix(&prefix)?;

        let mut out = Vec::with_capacity(page_size);
        let mut cursor = 0;

        while out.len() < page_size && cursor < stakes.len() {
            let window = stakes
                .iter()
                .skip(cursor)
                .take(page_size.saturating_mul(OVER_FETCH_FACTOR).max(1));

            let mut advanced = 0;

            for (_, value) in window {
                advanced += 1;

                let staking: StakingRecord =
                    bincode::deserialize(value).map_err(codec_err)?;

                if let Some(reward) = self.reward_for(&staking.staking_tx)? {
                    out.push(RewardEntry { staking, reward });
                    if out.len() == page_size {
                        break;
                    }
                }
            }

            cursor += advanced;

            if advanced == 0 {
                break;
            }
        }

        Ok(out)
    }
}

impl<B: KvBucket> BlockIndexer<PBlock> for RewardIndexer<B> {
    fn name(&self) -> &'static str {
        "rewards"
    }

    fn watermark(&self) -> Result<Option<BlockHeight>, IndexError> {
        Ok(bucket_watermark(&self.bucket)?)
    }

    fn process_batch(&self, blocks: &[PBlock]) -> Result<(), IndexError> {
        let Some(last) = blocks.last() else {
            return Ok(());
        };

        let mut entries: Vec<BucketWrite> = Vec::new();

        for block in blocks {
            for tx in &block.txs {
                match tx {
                    PTransaction::Stake {
                        base,
                        node_id,
                        stake_outs,
                        end_time,
                        reward_owner,
                        ..
                    } => {
                        let record = StakingRecord {
                            staking_tx: base.tx_id,
                            node_id: node_id.clone(),
                            amount_staked: stake_outs
                                .iter()
                                .filter_map(|o| o.output.amount())
                                .sum(),
                            start_time: block.timestamp,
                            end_time: *end_time,
                            reward_addresses: reward_owner.addresses.clone(),
                            block_height: block.height,
                        };

                        let encoded = bincode::serialize(&record).map_err(codec_err)?;

                        for address in &reward_owner.addresses {
                            entries.push((
                                Self::staking_key(address, *end_time, &base.tx_id),
                                Some(encoded.clone()),
                            ));
                        }
                    }

                    PTransaction::RewardValidator {
                        tx_id,
                        staking_tx_id,
                    } => {
                        let matching: Vec<_> = block
                            .reward_utxos
                            .iter()
                            .filter(|u| u.staking_tx_id == *staking_tx_id)
                            .collect();

                        let record = RewardRecord {
                            staking_tx: *staking_tx_id,
                            reward_tx: *tx_id,
                            amount: matching
                                .iter()
                                .filter_map(|u| u.out.output.amount())
                                .sum(),
                            utxo_count: matching.len() as u32,
                            rewarded_at: block.timestamp,
                        };

                        let encoded = bincode::serialize(&record).map_err(codec_err)?;
                        entries.push((Self::reward_key(staking_tx_id), Some(encoded)));
                    }

                    _ => {}
                }
            }
        }

        entries.push(watermark_write(last.height));
        self.bucket.write(&entries)?;

        Ok(())
    }
}
