//! Avalanche chain logic: decoded models, block-store codecs, the UTXO
//! indexing engine, the small domain indexers and the node RPC surface.

use thiserror::Error;

pub mod archive;
pub mod codec;
pub mod model;
pub mod rpc;
pub mod utxo;

pub mod indexers;

pub use model::*;

/// The native asset has nine decimal places on every network.
pub const AVAX_DENOMINATION: u8 = 9;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block decoding error: {0}")]
    Decoding(String),

    #[error("atomic payload decoding error: {0}")]
    AtomicDecoding(String),

    #[error("missing pre-cortina timestamp for tx {0}")]
    MissingTimestamp(serac_core::TxId),

    #[error("timestamp archive unavailable")]
    ArchiveUnavailable,

    #[error(transparent)]
    Store(#[from] serac_core::StoreError),
}

impl ChainError {
    pub fn decoding<T: std::fmt::Display>(value: T) -> Self {
        ChainError::Decoding(value.to_string())
    }
}

impl From<ChainError> for serac_core::IndexError {
    fn from(value: ChainError) -> Self {
        match value {
            ChainError::Store(x) => serac_core::IndexError::Store(x),
            other => serac_core::IndexError::Integrity(other.to_string()),
        }
    }
}
