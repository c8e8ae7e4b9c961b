//! Blockchain registry: every `CreateChain` seen on the P-chain.

use serde::{Deserialize, Serialize};

use serac_core::{
    bucket_watermark, watermark_write, BlockHeight, BlockIndexer, BucketWrite, Id32, IndexError,
    KvBucket, UnixTime,
};

use crate::model::{PBlock, PTransaction};

use super::codec_err;

const BY_ID: &[u8] = b"c:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockchainRecord {
    pub chain_id: Id32,
    pub name: String,
    pub subnet_id: Id32,
    pub vm_id: Id32,
    pub created_at_height: BlockHeight,
    pub created_at_time: UnixTime,
}

#[derive(Clone)]
pub struct BlockchainIndexer<B: KvBucket> {
    bucket: B,
}

impl<B: KvBucket> BlockchainIndexer<B> {
    pub fn new(bucket: B) -> Self {
        Self { bucket }
    }

    fn key(chain_id: &Id32) -> Vec<u8> {
        let mut key = BY_ID.to_vec();
        key.extend_from_slice(chain_id.as_bytes());
        key
    }

    pub fn get(&self, chain_id: &Id32) -> Result<Option<BlockchainRecord>, IndexError> {
        let Some(raw) = self.bucket.get(&Self::key(chain_id))? else {
            return Ok(None);
        };
        Ok(Some(bincode::deserialize(&raw).map_err(codec_err)?))
    }

    pub fn list(&self) -> Result<Vec<BlockchainRecord>, IndexError> {
        self.bucket
            .scan_prefix(BY_ID)?
            .into_iter()
            .map(|(_, value)| bincode::deserialize(&value).map_err(codec_err))
            .collect()
    }
}

impl<B: KvBucket> BlockIndexer<PBlock> for BlockchainIndexer<B> {
    fn name(&self) -> &'static str {
        "blockchains"
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
                if let PTransaction::CreateChain {
                    base,
                    subnet_id,
                    name,
                    vm_id,
                } = tx
                {
                    let record = BlockchainRecord {
                        chain_id: base.tx_id,
                        name: name.clone(),
                        subnet_id: *subnet_id,
                        vm_id: *vm_id,
                        created_at_height: block.height,
                        created_at_time: block.timestamp,
                    };

                    let encoded = bincode::serialize(&record).map_err(codec_err)?;
                    entries.push((Self::key(&record.chain_id), Some(encoded)));
                }
            }
        }

        entries.push(watermark_write(last.height));
        self.bucket.write(&entries)?;

        Ok(())
    }
}
