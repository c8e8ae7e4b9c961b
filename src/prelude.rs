pub use serac_core::{
    BlockHeight, BlockIndexer, BlockStore, BucketKind, ChainTag, Domain, IndexError, KvBucket,
    NetworkParams, RpcCache, ServeError, StageWatermark, StoreError, TxIndexer, TxLogStore,
    UtxoStore,
};

pub use tokio_util::sync::CancellationToken;

pub use crate::adapters::DomainAdapter;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Serve(#[from] ServeError),

    #[error("chain error: {0}")]
    Chain(String),

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl Error {
    pub fn config<T: std::fmt::Display>(value: T) -> Self {
        Error::Config(value.to_string())
    }

    pub fn storage<T: std::fmt::Display>(value: T) -> Self {
        Error::Storage(value.to_string())
    }
}

impl From<serac_avalanche::ChainError> for Error {
    fn from(value: serac_avalanche::ChainError) -> Self {
        Error::Chain(value.to_string())
    }
}

impl From<serac_core::RpcError> for Error {
    fn from(value: serac_core::RpcError) -> Self {
        Error::Rpc(value.to_string())
    }
}
