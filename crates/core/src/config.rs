//! Daemon configuration blocks, deserialized from `serac.toml` plus env
//! overrides by the root crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory where to find storage. Chain data lands under
    /// `{path}/{network_id}/...`.
    pub path: std::path::PathBuf,

    /// Size (in Mb) of memory allocated for block cache
    pub cache: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: std::path::PathBuf::from("data"),
            cache: None,
        }
    }
}

/// Node RPC endpoints, one base url per chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub p_chain_url: String,
    pub x_chain_url: String,
    pub c_chain_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Blocks fetched in parallel per store batch
    pub fetch_batch_size: Option<usize>,

    /// Blocks handed to each indexer per processing batch
    pub run_batch_size: Option<usize>,

    /// Sequential tx index of the X-chain Cortina transition: entries below
    /// it live in the tx log, heights after it in linear blocks
    pub cortina_transition_index: u64,

    /// First C-chain height with ApricotPhase5 framing; `None` means the
    /// whole history is post-AP5
    pub ap5_height: Option<u64>,

    /// Path to the pre-Cortina timestamp archive; required when the
    /// pre-Cortina stage has transactions left to drain
    pub timestamp_archive: Option<std::path::PathBuf>,
}

pub const DEFAULT_FETCH_BATCH: usize = 10;
pub const DEFAULT_RUN_BATCH: usize = 100;

impl SyncConfig {
    pub fn fetch_batch(&self) -> usize {
        self.fetch_batch_size.unwrap_or(DEFAULT_FETCH_BATCH).max(1)
    }

    pub fn run_batch(&self) -> usize {
        self.run_batch_size.unwrap_or(DEFAULT_RUN_BATCH).max(1)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `error` | `warn` | `info` | `debug` | `trace`
    pub max_level: Option<String>,
}
