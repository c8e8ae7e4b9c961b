//! Subnet indexer: creation, ownership transfers, L1 conversion.
//!
//! Ownership transfers mutate records created earlier, possibly inside the
//! same batch; the KV batch has no read-your-writes, so pending records live
//! in an in-batch map until the atomic write.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use serac_core::{
    bucket_watermark, watermark_write, BlockHeight, BlockIndexer, BucketWrite, ChainId, Id32,
    IndexError, KvBucket, UnixTime,
};

use crate::model::{Owners, PBlock, PTransaction, SubnetAction};

use super::codec_err;

const BY_ID: &[u8] = b"s:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubnetRecord {
    pub subnet_id: Id32,
    pub owners: Owners,
    pub created_at_height: BlockHeight,
    pub created_at_time: UnixTime,
    pub is_l1: bool,
    pub manager_chain_id: Option<ChainId>,
    pub manager_address: Option<Vec<u8>>,
}

#[derive(Clone)]
pub struct SubnetIndexer<B: KvBucket> {
    bucket: B,
}

impl<B: KvBucket> SubnetIndexer<B> {
    pub fn new(bucket: B) -> Self {
        Self { bucket }
    }

    fn key(subnet_id: &Id32) -> Vec<u8> {
        let mut key = BY_ID.to_vec();
        key.extend_from_slice(subnet_id.as_bytes());
        key
    }

    pub fn get(&self, subnet_id: &Id32) -> Result<Option<SubnetRecord>, IndexError> {
        let Some(raw) = self.bucket.get(&Self::key(subnet_id))? else {
            return Ok(None);
        };
        Ok(Some(bincode::deserialize(&raw).map_err(codec_err)?))
    }

    pub fn list(&self) -> Result<Vec<SubnetRecord>, IndexError> {
        self.bucket
            .scan_prefix(BY_ID)?
            .into_iter()
            .map(|(_, value)| bincode::deserialize(&value).map_err(codec_err))
            .collect()
    }

    /// Read through the in-batch pending map first, then the store.
    fn load(
        &self,
        pending: &HashMap<Id32, SubnetRecord>,
        subnet_id: &Id32,
    ) -> Result<Option<SubnetRecord>, IndexError> {
        if let Some(hit) = pending.get(subnet_id) {
            return Ok(Some(hit.clone()));
        }
        self.get(subnet_id)
    }
}

impl<B: KvBucket> BlockIndexer<PBlock> for SubnetIndexer<B> {
    fn name(&self) -> &'static str {
        "subnets"
    }

    fn watermark(&self) -> Result<Option<BlockHeight>, IndexError> {
        Ok(bucket_watermark(&self.bucket)?)
    }

    fn process_batch(&self, blocks: &[PBlock]) -> Result<(), IndexError> {
        let Some(last) = blocks.last() else {
            return Ok(());
        };

        let mut pending: HashMap<Id32, SubnetRecord> = HashMap::new();

        for block in blocks {
            for tx in &block.txs {
                match tx {
                    PTransaction::CreateSubnet { base, owners } => {
                        pending.insert(
                            base.tx_id,
                            SubnetRecord {
                                subnet_id: base.tx_id,
                                owners: owners.clone(),
                                created_at_height: block.height,
                                created_at_time: block.timestamp,
                                is_l1: false,
                                manager_chain_id: None,
                                manager_address: None,
                            },
                        );
                    }

                    PTransaction::SubnetAction { action, .. } => match action {
                        SubnetAction::TransferSubnetOwnership { subnet_id, owners } => {
                            if let Some(mut record) = self.load(&pending, subnet_id)? {
                                record.owners = owners.clone();
                                pending.insert(*subnet_id, record);
                            }
                        }

                        SubnetAction::ConvertSubnetToL1 {
                            subnet_id,
                            manager_chain_id,
                            manager_address,
                        } => {
                            if let Some(mut record) = self.load(&pending, subnet_id)? {
                                record.is_l1 = true;
                                record.manager_chain_id = Some(*manager_chain_id);
                                record.manager_address = Some(manager_address.clone());
                                pending.insert(*subnet_id, record);
                            }
                        }

                        _ => {}
                    },

                    _ => {}
                }
            }
        }

        let mut entries: Vec<BucketWrite> = Vec::with_capacity(pending.len() + 1);

        for (subnet_id, record) in pending {
            let encoded = bincode::serialize(&record).map_err(codec_err)?;
            entries.push((Self::key(&subnet_id), Some(encoded)));
        }

        entries.push(watermark_write(last.height));
        self.bucket.write(&entries)?;

        Ok(())
    }
}
