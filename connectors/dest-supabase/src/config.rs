//! Supabase connection configuration.

use std::fmt;

use scout_types::error::ConnectorError;
use serde::Deserialize;

/// PostgreSQL's identifier length limit.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Supabase connection and layout settings.
#[derive(Clone, Deserialize)]
pub struct Config {
    pub url: String,
    pub service_key: String,
    /// Schema holding the bronze, checkpoint, and log tables.
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_checkpoint_table")]
    pub checkpoint_table: String,
    #[serde(default = "default_log_table")]
    pub log_table: String,
    /// Natural-key column used for `on_conflict` upserts.
    #[serde(default = "default_conflict_column")]
    pub conflict_column: String,
    /// Derived-layer refresh functions, run in order after each load.
    #[serde(default = "default_refresh_functions")]
    pub refresh_functions: Vec<String>,
    /// Schema the refresh functions are exposed under.
    #[serde(default = "default_rpc_schema")]
    pub rpc_schema: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_schema() -> String {
    "scout".to_string()
}

fn default_table() -> String {
    "bronze_transactions".to_string()
}

fn default_checkpoint_table() -> String {
    "sync_checkpoints".to_string()
}

fn default_log_table() -> String {
    "sync_logs".to_string()
}

fn default_conflict_column() -> String {
    "source_id".to_string()
}

fn default_refresh_functions() -> Vec<String> {
    vec![
        "refresh_scout_silver_layer".to_string(),
        "refresh_scout_gold_views".to_string(),
    ]
}

fn default_rpc_schema() -> String {
    "public".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

/// Check a name is a plain PostgreSQL identifier.
///
/// Names are interpolated into request paths, so anything beyond
/// `[A-Za-z_][A-Za-z0-9_]*` is rejected.
///
/// # Errors
///
/// Returns a description of the first violation.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err("identifier must not be empty".to_string());
    };
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(format!(
            "identifier '{name}' exceeds {MAX_IDENTIFIER_LEN} bytes (got {})",
            name.len()
        ));
    }
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(format!(
            "identifier '{name}' must start with a letter or underscore"
        ));
    }
    if let Some(bad) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(format!("identifier '{name}' contains invalid character '{bad}'"));
    }
    Ok(())
}

impl Config {
    /// Config with every optional setting at its default.
    #[must_use]
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_key: service_key.into(),
            schema: default_schema(),
            table: default_table(),
            checkpoint_table: default_checkpoint_table(),
            log_table: default_log_table(),
            conflict_column: default_conflict_column(),
            refresh_functions: default_refresh_functions(),
            rpc_schema: default_rpc_schema(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Every problem with this config, empty when valid.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let url = self.url.trim();
        if url.is_empty() {
            problems.push("sink.url must not be empty".to_string());
        } else if !(url.starts_with("http://") || url.starts_with("https://")) {
            problems.push(format!("sink.url '{url}' must start with http:// or https://"));
        }
        if self.service_key.trim().is_empty() {
            problems.push("sink.service_key must not be empty".to_string());
        }
        let names = [
            ("sink.schema", &self.schema),
            ("sink.table", &self.table),
            ("sink.checkpoint_table", &self.checkpoint_table),
            ("sink.log_table", &self.log_table),
            ("sink.conflict_column", &self.conflict_column),
            ("sink.rpc_schema", &self.rpc_schema),
        ];
        for (key, name) in names {
            if let Err(e) = validate_identifier(name) {
                problems.push(format!("{key}: {e}"));
            }
        }
        for function in &self.refresh_functions {
            if let Err(e) = validate_identifier(function) {
                problems.push(format!("sink.refresh_functions: {e}"));
            }
        }
        if self.timeout_seconds == 0 {
            problems.push("sink.timeout_seconds must be > 0".to_string());
        }
        problems
    }

    /// Validate the config.
    ///
    /// # Errors
    ///
    /// Returns a `config` [`ConnectorError`] listing every problem found.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConnectorError::config("INVALID_CONFIG", problems.join("; ")))
        }
    }

    /// PostgREST base, e.g. `https://x.supabase.co/rest/v1`.
    #[must_use]
    pub fn rest_base(&self) -> String {
        format!("{}/rest/v1", self.url.trim().trim_end_matches('/'))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("service_key", &"<redacted>")
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("checkpoint_table", &self.checkpoint_table)
            .field("log_table", &self.log_table)
            .field("conflict_column", &self.conflict_column)
            .field("refresh_functions", &self.refresh_functions)
            .field("rpc_schema", &self.rpc_schema)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}
