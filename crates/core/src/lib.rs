//! Traits and machinery that are common to all serac crates.
//!
//! Glossary:
//!  - `batch`: a group of consecutive blocks that an indexer processes and
//!    commits together with its watermark.
//!  - `watermark`: the height (or sequential tx index) through which a
//!    component has durably processed data.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod ids;
pub mod model;
pub mod network;
pub mod store;

pub use config::*;
pub use ids::*;
pub use model::*;
pub use network::*;
pub use store::*;

/// The height of a block (a.k.a. block number)
pub type BlockHeight = u64;

/// The sequential index of a pre-Cortina X-chain transaction
pub type TxIndex = u64;

/// Seconds since the unix epoch
pub type UnixTime = u64;

/// The index of an output within a tx
pub type OutputIndex = u32;

pub type RawPayload = Vec<u8>;

/// The three chains of an Avalanche-style network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainTag {
    Platform,
    Exchange,
    Contract,
}

impl ChainTag {
    pub const ALL: [ChainTag; 3] = [ChainTag::Platform, ChainTag::Exchange, ChainTag::Contract];

    /// Single-byte partition prefix used in KV keys.
    pub fn prefix(&self) -> u8 {
        match self {
            ChainTag::Platform => b'p',
            ChainTag::Exchange => b'x',
            ChainTag::Contract => b'c',
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            ChainTag::Platform => "p",
            ChainTag::Exchange => "x",
            ChainTag::Contract => "c",
        }
    }

    pub fn alias(&self) -> &'static str {
        match self {
            ChainTag::Platform => "p-chain",
            ChainTag::Exchange => "x-chain",
            ChainTag::Contract => "c-chain",
        }
    }
}

impl std::fmt::Display for ChainTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.alias())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage engine error: {0}")]
    Engine(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}

impl StoreError {
    pub fn engine<T: std::fmt::Display>(value: T) -> Self {
        StoreError::Engine(value.to_string())
    }

    pub fn codec<T: std::fmt::Display>(value: T) -> Self {
        StoreError::Codec(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("chain not supported for this call: {0}")]
    UnsupportedChain(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced by indexers while processing a batch.
///
/// `Integrity` is fatal: the indexing path never skips blocks. `Transient`
/// errors are retried by the runner with backoff. `MissingCrossChainData` is a
/// notice: the record stays partial and indexing continues.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("data integrity violation: {0}")]
    Integrity(String),

    #[error("missing cross-chain data: {0}")]
    MissingCrossChainData(String),

    #[error("transient error: {0}")]
    Transient(String),
}

impl IndexError {
    pub fn integrity<T: std::fmt::Display>(value: T) -> Self {
        IndexError::Integrity(value.to_string())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, IndexError::Integrity(_) | IndexError::Store(_))
    }
}

impl From<RpcError> for IndexError {
    fn from(value: RpcError) -> Self {
        match value {
            RpcError::Transport(x) => IndexError::Transient(x),
            RpcError::Malformed(x) => IndexError::Integrity(x),
            RpcError::UnsupportedChain(x) => IndexError::MissingCrossChainData(x),
            RpcError::Store(x) => IndexError::Store(x),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind listener")]
    BindError(std::io::Error),

    #[error("failed to shutdown")]
    ShutdownError(std::io::Error),

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(String),

    #[error("invalid setting {0}: {1}")]
    Invalid(String, String),
}

/// Access to the concrete stores backing a running node.
///
/// There is one implementation per deployment (the adapter in the root crate)
/// but services and indexers stay generic so they can run against the
/// tempdir stores used by tests.
pub trait Domain: Clone + Send + Sync + 'static {
    type Blocks: store::BlockStore;
    type TxLog: store::TxLogStore;
    type Utxos: store::UtxoStore;
    type Bucket: store::KvBucket;
    type Cache: store::RpcCache;

    fn blocks(&self, chain: ChainTag) -> &Self::Blocks;
    fn x_tx_log(&self) -> &Self::TxLog;
    fn utxos(&self) -> &Self::Utxos;
    fn bucket(&self, name: store::BucketKind) -> &Self::Bucket;
    fn rpc_cache(&self) -> &Self::Cache;
    fn params(&self) -> &network::NetworkParams;
}

/// A long-lived service (HTTP API, exporter, monitor) that runs until its
/// cancellation token fires.
#[trait_variant::make(Send)]
pub trait Driver<D: Domain>: Send + Sync + 'static {
    type Config: Clone;

    async fn run(
        config: Self::Config,
        domain: D,
        cancel: CancellationToken,
    ) -> Result<(), ServeError>;
}

/// An indexer over decoded blocks of one chain.
///
/// The runner trusts the implementation to persist its watermark in the same
/// storage batch as the state mutations for that batch.
pub trait BlockIndexer<B>: Send + Sync {
    fn name(&self) -> &'static str;

    fn watermark(&self) -> Result<Option<BlockHeight>, IndexError>;

    fn process_batch(&self, blocks: &[B]) -> Result<(), IndexError>;
}

/// An indexer over sequential pre-Cortina X-chain transactions.
pub trait TxIndexer<T>: Send + Sync {
    fn name(&self) -> &'static str;

    fn tx_watermark(&self) -> Result<Option<TxIndex>, IndexError>;

    fn process_tx_batch(&self, txs: &[T]) -> Result<(), IndexError>;
}
