//! Exporter configuration, read purely from the environment. Any problem
//! here is fatal at startup: the daemon refuses to run with exit code 1.

use std::time::Duration;

use base64::Engine as _;

use crate::ExportError;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_PARTIAL_WAIT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct SnowflakeConfig {
    pub account: String,
    pub user: String,
    /// PKCS8 RSA private key, PEM text (arrives base64-wrapped)
    pub private_key_pem: Vec<u8>,
    pub database: String,
    pub schema: String,
    pub warehouse: String,
    pub role: Option<String>,
    pub table_prefix: String,
}

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub snowflake: SnowflakeConfig,
    pub ingestion_url: String,
    pub batch_size: usize,
    pub partial_wait: Duration,
    pub error_backoff: Duration,
}

fn require(name: &str) -> Result<String, ExportError> {
    std::env::var(name).map_err(|_| ExportError::Config(format!("missing env var {name}")))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_secs(name: &str, default: Duration) -> Result<Duration, ExportError> {
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| ExportError::Config(format!("{name} must be an integer number of seconds"))),
    }
}

impl ExporterConfig {
    pub fn from_env() -> Result<Self, ExportError> {
        let key_b64 = require("SNOWFLAKE_PRIVATE_KEY")?;

        let private_key_pem = base64::engine::general_purpose::STANDARD
            .decode(key_b64.trim())
            .map_err(|_| {
                ExportError::Config("SNOWFLAKE_PRIVATE_KEY must be base64-encoded PEM".into())
            })?;

        let batch_size = match optional("BATCH_SIZE") {
            None => DEFAULT_BATCH_SIZE,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ExportError::Config("BATCH_SIZE must be a positive integer".into())
                })?,
        };

        Ok(Self {
            snowflake: SnowflakeConfig {
                account: require("SNOWFLAKE_ACCOUNT")?,
                user: require("SNOWFLAKE_USER")?,
                private_key_pem,
                database: require("SNOWFLAKE_DATABASE")?,
                schema: require("SNOWFLAKE_SCHEMA")?,
                warehouse: require("SNOWFLAKE_WAREHOUSE")?,
                role: optional("SNOWFLAKE_ROLE"),
                table_prefix: require("SNOWFLAKE_TABLE_PREFIX")?,
            },
            ingestion_url: require("INGESTION_URL")?,
            batch_size,
            partial_wait: parse_secs("PARTIAL_BATCH_WAIT", DEFAULT_PARTIAL_WAIT)?,
            error_backoff: parse_secs("ERROR_BACKOFF", DEFAULT_ERROR_BACKOFF)?,
        })
    }
}
