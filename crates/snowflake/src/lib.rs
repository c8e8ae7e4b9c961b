//! EVM chain export to Snowflake: deterministic transformation of
//! normalized blocks into six relational row streams, committed as one
//! multi-table transaction with at-least-once semantics.

use thiserror::Error;

pub mod config;
pub mod daemon;
pub mod model;
pub mod rows;
pub mod transform;
pub mod writer;

pub use config::ExporterConfig;
pub use daemon::{Daemon, IngestionSource, StepOutcome};
pub use model::*;
pub use rows::ExportBatch;
pub use transform::transform;
pub use writer::{SnowflakeWriter, Warehouse};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("ingestion error: {0}")]
    Ingestion(String),

    #[error("warehouse schema mismatch: {0}")]
    Schema(String),

    /// Wrong starting block; the next iteration re-reads MAX and resumes.
    #[error("duplicate primary key: {0}")]
    DuplicateKey(String),
}

impl From<serac_core::ConfigError> for ExportError {
    fn from(value: serac_core::ConfigError) -> Self {
        ExportError::Config(value.to_string())
    }
}
