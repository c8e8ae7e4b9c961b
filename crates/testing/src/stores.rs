//! Tempdir-backed stores with the production layout.

use tempfile::TempDir;

use serac_core::ChainTag;

pub struct TempStores {
    // dropped last; removing the directory under live stores is an error
    _dir: TempDir,
    pub p_blocks: serac_fjall::BlockStore,
    pub x_blocks: serac_fjall::BlockStore,
    pub c_blocks: serac_fjall::BlockStore,
    pub utxos: serac_fjall::UtxoStore,
    pub bucket: serac_fjall::Bucket,
    pub cache: serac_fjall::RpcCache,
}

impl TempStores {
    pub fn open() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        let blocks = |chain: ChainTag| {
            serac_fjall::BlockStore::open(root.join("blocks").join(chain.dir_name()), None)
                .expect("block store")
        };

        Self {
            p_blocks: blocks(ChainTag::Platform),
            x_blocks: blocks(ChainTag::Exchange),
            c_blocks: blocks(ChainTag::Contract),
            utxos: serac_fjall::UtxoStore::open(root.join("utxos"), None).expect("utxo store"),
            bucket: serac_fjall::Bucket::open(root.join("bucket"), None).expect("bucket"),
            cache: serac_fjall::RpcCache::open(root.join("rpc_cache"), None).expect("cache"),
            _dir: dir,
        }
    }
}
