//! Per-address chain list: which chains an address has ever touched.
//!
//! One instance runs per chain runner; each keeps its own watermark cell in
//! the shared bucket.

use serac_core::{
    BlockHeight, BlockIndexer, BucketWrite, ChainId, ChainTag, Id32, IndexError, KvBucket,
    StoreError,
};

use crate::model::{CAtomicTx, CBlock, PBlock, XBlock};

const BY_ADDRESS: &[u8] = b"a:";
const WATERMARK: &[u8] = b"_watermark:";

#[derive(Clone)]
pub struct ChainListIndexer<B: KvBucket> {
    bucket: B,
    chain: ChainTag,
    chain_id: ChainId,
}

impl<B: KvBucket> ChainListIndexer<B> {
    pub fn new(bucket: B, chain: ChainTag, chain_id: ChainId) -> Self {
        Self {
            bucket,
            chain,
            chain_id,
        }
    }

    fn entry_key(address: &str, chain_id: &ChainId) -> Vec<u8> {
        let mut key = BY_ADDRESS.to_vec();
        key.extend_from_slice(address.as_bytes());
        key.push(0);
        key.extend_from_slice(chain_id.as_bytes());
        key
    }

    fn watermark_key(&self) -> Vec<u8> {
        let mut key = WATERMARK.to_vec();
        key.push(self.chain.prefix());
        key
    }

    fn read_watermark(&self) -> Result<Option<BlockHeight>, IndexError> {
        let Some(raw) = self.bucket.get(&self.watermark_key())? else {
            return Ok(None);
        };

        let bytes: [u8; 8] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Codec("watermark cell is not 8 bytes".into()))?;

        Ok(Some(u64::from_be_bytes(bytes)))
    }

    fn commit(&self, mut entries: Vec<BucketWrite>, height: BlockHeight) -> Result<(), IndexError> {
        entries.push((self.watermark_key(), Some(height.to_be_bytes().to_vec())));
        self.bucket.write(&entries)?;
        Ok(())
    }

    fn touch(&self, entries: &mut Vec<BucketWrite>, address: &str) {
        entries.push((Self::entry_key(address, &self.chain_id), Some(Vec::new())));
    }

    /// Chain ids the address has appeared on, across all instances.
    pub fn chains_for_address(&self, address: &str) -> Result<Vec<ChainId>, IndexError> {
        let mut prefix = BY_ADDRESS.to_vec();
        prefix.extend_from_slice(address.as_bytes());
        prefix.push(0);

        let mut out = Vec::new();

        for (key, _) in self.bucket.scan_prefix(&prefix)? {
            let tail = &key[prefix.len()..];
            let bytes: [u8; 32] = tail
                .try_into()
                .map_err(|_| StoreError::Codec("chain id suffix is not 32 bytes".into()))?;
            out.push(Id32::from(bytes));
        }

        Ok(out)
    }
}

impl<B: KvBucket> BlockIndexer<PBlock> for ChainListIndexer<B> {
    fn name(&self) -> &'static str {
        "chain_list"
    }

    fn watermark(&self) -> Result<Option<BlockHeight>, IndexError> {
        self.read_watermark()
    }

    fn process_batch(&self, blocks: &[PBlock]) -> Result<(), IndexError> {
        let Some(last) = blocks.last() else {
            return Ok(());
        };

        let mut entries = Vec::new();

        for block in blocks {
            for tx in &block.txs {
                if let Some(base) = tx.base() {
                    for out in &base.outs {
                        for address in out.output.addresses() {
                            self.touch(&mut entries, address);
                        }
                    }
                }
            }
        }

        self.commit(entries, last.height)
    }
}

impl<B: KvBucket> BlockIndexer<XBlock> for ChainListIndexer<B> {
    fn name(&self) -> &'static str {
        "chain_list"
    }

    fn watermark(&self) -> Result<Option<BlockHeight>, IndexError> {
        self.read_watermark()
    }

    fn process_batch(&self, blocks: &[XBlock]) -> Result<(), IndexError> {
        let Some(last) = blocks.last() else {
            return Ok(());
        };

        let mut entries = Vec::new();

        for block in blocks {
            for tx in &block.txs {
                for out in &tx.base().outs {
                    for address in out.output.addresses() {
                        self.touch(&mut entries, address);
                    }
                }
            }
        }

        self.commit(entries, last.height)
    }
}

impl<B: KvBucket> BlockIndexer<CBlock> for ChainListIndexer<B> {
    fn name(&self) -> &'static str {
        "chain_list"
    }

    fn watermark(&self) -> Result<Option<BlockHeight>, IndexError> {
        self.read_watermark()
    }

    fn process_batch(&self, blocks: &[CBlock]) -> Result<(), IndexError> {
        let Some(last) = blocks.last() else {
            return Ok(());
        };

        let mut entries = Vec::new();

        for block in blocks {
            for tx in &block.atomic_txs {
                match tx {
                    CAtomicTx::Export { exported_outs, .. } => {
                        for out in exported_outs {
                            for address in out.output.addresses() {
                                self.touch(&mut entries, address);
                            }
                        }
                    }
                    CAtomicTx::Import { evm_outputs, .. } => {
                        for out in evm_outputs {
                            self.touch(&mut entries, &out.address);
                        }
                    }
                }
            }
        }

        self.commit(entries, last.height)
    }
}
