//! The atomic warehouse writer.
//!
//! One transaction, six bulk inserts, then commit; any failure rolls back
//! and nothing becomes visible. The writer never deduplicates: the daemon
//! picks the starting block by re-reading MAX(BLOCKNUMBER) each iteration,
//! which is sound precisely because all six tables commit together.

use base64::Engine as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::{config::SnowflakeConfig, rows::ExportBatch, ExportError};

#[trait_variant::make(Send)]
pub trait Warehouse: Send + Sync + 'static {
    async fn max_block_number(&self) -> Result<Option<u64>, ExportError>;

    async fn write_batch(&self, batch: &ExportBatch) -> Result<(), ExportError>;
}

pub struct SnowflakeWriter {
    http: reqwest::Client,
    config: SnowflakeConfig,
    statements_url: String,
    encoding_key: jsonwebtoken::EncodingKey,
    key_fingerprint: String,
}

const JWT_LIFETIME_SECS: i64 = 59 * 60;

impl SnowflakeWriter {
    pub fn new(config: SnowflakeConfig) -> Result<Self, ExportError> {
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(&config.private_key_pem)
            .map_err(|e| ExportError::Config(format!("invalid private key: {e}")))?;

        let key_fingerprint = fingerprint(&config.private_key_pem);

        let statements_url = format!(
            "https://{}.snowflakecomputing.com/api/v2/statements",
            config.account.to_ascii_lowercase()
        );

        Ok(Self {
            http: reqwest::Client::new(),
            config,
            statements_url,
            encoding_key,
            key_fingerprint,
        })
    }

    fn table(&self, name: &str) -> String {
        format!(
            "{}.{}.{}{}",
            self.config.database, self.config.schema, self.config.table_prefix, name
        )
    }

    fn bearer(&self) -> Result<String, ExportError> {
        #[derive(serde::Serialize)]
        struct Claims {
            iss: String,
            sub: String,
            iat: i64,
            exp: i64,
        }

        let account = self.config.account.to_ascii_uppercase();
        let user = self.config.user.to_ascii_uppercase();

        let now = chrono::Utc::now().timestamp();

        let claims = Claims {
            iss: format!("{account}.{user}.{}", self.key_fingerprint),
            sub: format!("{account}.{user}"),
            iat: now,
            exp: now + JWT_LIFETIME_SECS,
        };

        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )
        .map_err(|e| ExportError::Config(format!("jwt signing failed: {e}")))
    }

    async fn submit(&self, statement: String, statement_count: usize) -> Result<(), ExportError> {
        let token = self.bearer()?;

        let body = serde_json::json!({
            "statement": statement,
            "warehouse": self.config.warehouse,
            "role": self.config.role,
            "database": self.config.database,
            "schema": self.config.schema,
            "timeout": 300,
            "parameters": {
                "MULTI_STATEMENT_COUNT": statement_count.to_string(),
            },
        });

        let response = self
            .http
            .post(&self.statements_url)
            .bearer_auth(token)
            .header("X-Snowflake-Authorization-Token-Type", "KEYPAIR_JWT")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExportError::Transport(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();

        // server-side transaction state is discarded on failure; classify for
        // the daemon's retry policy
        if detail.to_ascii_lowercase().contains("duplicate key") {
            return Err(ExportError::DuplicateKey(detail));
        }

        if status.as_u16() == 422 {
            return Err(ExportError::Schema(detail));
        }

        Err(ExportError::Transport(format!("{status}: {detail}")))
    }

    async fn query_single(&self, statement: String) -> Result<Option<String>, ExportError> {
        #[derive(Deserialize)]
        struct StatementResult {
            data: Vec<Vec<Option<String>>>,
        }

        let token = self.bearer()?;

        let body = serde_json::json!({
            "statement": statement,
            "warehouse": self.config.warehouse,
            "role": self.config.role,
            "database": self.config.database,
            "schema": self.config.schema,
            "timeout": 60,
        });

        let response = self
            .http
            .post(&self.statements_url)
            .bearer_auth(token)
            .header("X-Snowflake-Authorization-Token-Type", "KEYPAIR_JWT")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExportError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExportError::Transport(detail));
        }

        let result: StatementResult = response
            .json()
            .await
            .map_err(|e| ExportError::Transport(e.to_string()))?;

        Ok(result.data.first().and_then(|row| row.first().cloned()).flatten())
    }
}

impl Warehouse for SnowflakeWriter {
    async fn max_block_number(&self) -> Result<Option<u64>, ExportError> {
        let statement = format!(
            "SELECT MAX(BLOCK_NUMBER) FROM {}",
            self.table("BLOCKS")
        );

        match self.query_single(statement).await? {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ExportError::Schema(format!("MAX(BLOCK_NUMBER) not numeric: {raw}"))),
        }
    }

    async fn write_batch(&self, batch: &ExportBatch) -> Result<(), ExportError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut statements = vec!["BEGIN".to_string()];

        statements.extend(insert_statement(
            &self.table("BLOCKS"),
            &batch.blocks,
        )?);
        statements.extend(insert_statement(
            &self.table("TRANSACTIONS"),
            &batch.transactions,
        )?);
        statements.extend(insert_statement(
            &self.table("RECEIPTS"),
            &batch.receipts,
        )?);
        statements.extend(insert_statement(&self.table("LOGS"), &batch.logs)?);
        statements.extend(insert_statement(
            &self.table("INTERNAL_TRANSACTIONS"),
            &batch.internal_txs,
        )?);
        statements.extend(insert_statement(
            &self.table("MESSAGES"),
            &batch.messages,
        )?);

        statements.push("COMMIT".to_string());

        let count = statements.len();
        self.submit(statements.join(";\n"), count).await
    }
}

fn fingerprint(pem: &[u8]) -> String {
    let digest = Sha256::digest(pem);
    format!("SHA256:{}", base64::engine::general_purpose::STANDARD.encode(digest))
}

/// Render one bulk insert from a row slice via its CSV field order. Empty
/// slices produce no statement: Snowflake rejects `VALUES ()` and an absent
/// table in a batch is fine because MAX comes from BLOCKS alone.
fn insert_statement<R: serde::Serialize>(
    table: &str,
    rows: &[R],
) -> Result<Option<String>, ExportError> {
    if rows.is_empty() {
        return Ok(None);
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ExportError::Schema(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Schema(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| ExportError::Schema(e.to_string()))?;

    let mut lines = text.lines();

    let header = lines
        .next()
        .ok_or_else(|| ExportError::Schema("empty render".into()))?;

    let columns: Vec<String> = header
        .split(',')
        .map(|name| name.to_ascii_uppercase())
        .collect();

    let values: Vec<String> = lines
        .map(|line| {
            let rendered: Vec<String> = split_csv_line(line)
                .into_iter()
                .map(|field| sql_literal(&field))
                .collect();
            format!("({})", rendered.join(","))
        })
        .collect();

    Ok(Some(format!(
        "INSERT INTO {table} ({}) VALUES {}",
        columns.join(","),
        values.join(",")
    )))
}

/// Minimal CSV field split for our own rendering: fields never contain
/// embedded newlines, quotes only appear when the csv writer added them.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }

    fields.push(current);
    fields
}

fn sql_literal(field: &str) -> String {
    // numbers pass through bare; everything else is quoted with '' escaping
    if !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit()) {
        return field.to_string();
    }

    format!("'{}'", field.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::BlockRow;

    fn sample_row() -> BlockRow {
        BlockRow {
            block_number: 100,
            block_hash: "0xb10c".into(),
            parent_hash: "0xb0ff".into(),
            block_timestamp: 1_700_000_000,
            transactions_count: 1,
            gas_limit: 15_000_000,
            gas_used: 21_000,
            base_fee_per_gas: "25000000000".into(),
            miner: "0xc0de".into(),
            difficulty: "1".into(),
            size: 1234,
            transactions_root: "0xt".into(),
            block_receipt_hash: "0xreceipts".into(),
            block_receipts_root: "0xstate".into(),
            block_state_root: "0xstate".into(),
            extra_data: "YXRvbWlj".into(),
        }
    }

    #[test]
    fn insert_statement_uses_upper_columns_and_literals() {
        let stmt = insert_statement("DB.SCHEMA.PBLOCKS", &[sample_row()])
            .unwrap()
            .unwrap();

        assert!(stmt.starts_with("INSERT INTO DB.SCHEMA.PBLOCKS (BLOCK_NUMBER,BLOCK_HASH"));
        assert!(stmt.contains("VALUES (100,'0xb10c'"));
        assert!(stmt.contains("'YXRvbWlj'"));
    }

    #[test]
    fn empty_tables_are_skipped() {
        let stmt = insert_statement::<BlockRow>("T", &[]).unwrap();
        assert!(stmt.is_none());
    }

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(sql_literal("it's"), "'it''s'");
        assert_eq!(sql_literal("123"), "123");
        assert_eq!(sql_literal(""), "''");
        assert_eq!(sql_literal("0x12"), "'0x12'");
    }

    #[test]
    fn csv_line_split_handles_quoted_fields() {
        assert_eq!(split_csv_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_csv_line("a,\"b,c\",d"), vec!["a", "b,c", "d"]);
        assert_eq!(split_csv_line("\"he said \"\"hi\"\"\",x"), vec!["he said \"hi\"", "x"]);
    }
}
