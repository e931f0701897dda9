//! Odoo connection configuration.

use std::fmt;

use scout_types::error::ConnectorError;
use serde::Deserialize;

/// Odoo connection and extraction settings.
#[derive(Clone, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_jsonrpc_path")]
    pub jsonrpc_path: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Order states treated as terminal (paid) and therefore synced.
    #[serde(default = "default_order_states")]
    pub order_states: Vec<String>,
    /// Maximum ids per dimension lookup request.
    #[serde(default = "default_dimension_page_size")]
    pub dimension_page_size: usize,
    /// Many-to-one product field holding the brand. `None` disables the
    /// lookup for databases without the brand extension.
    #[serde(default = "default_brand_field")]
    pub brand_field: Option<String>,
}

fn default_jsonrpc_path() -> String {
    "/jsonrpc".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_order_states() -> Vec<String> {
    vec!["paid".into(), "done".into(), "invoiced".into()]
}

fn default_dimension_page_size() -> usize {
    200
}

#[allow(clippy::unnecessary_wraps)]
fn default_brand_field() -> Option<String> {
    Some("product_brand_id".to_string())
}

impl Config {
    /// Config with every optional setting at its default.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            jsonrpc_path: default_jsonrpc_path(),
            timeout_seconds: default_timeout_seconds(),
            order_states: default_order_states(),
            dimension_page_size: default_dimension_page_size(),
            brand_field: default_brand_field(),
        }
    }

    /// Every problem with this config, empty when valid.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let url = self.base_url.trim();
        if url.is_empty() {
            problems.push("source.base_url must not be empty".to_string());
        } else if !(url.starts_with("http://") || url.starts_with("https://")) {
            problems.push(format!(
                "source.base_url '{url}' must start with http:// or https://"
            ));
        }
        if self.database.trim().is_empty() {
            problems.push("source.database must not be empty".to_string());
        }
        if self.username.trim().is_empty() {
            problems.push("source.username must not be empty".to_string());
        }
        if self.password.is_empty() {
            problems.push("source.password must not be empty".to_string());
        }
        if !self.jsonrpc_path.starts_with('/') {
            problems.push(format!(
                "source.jsonrpc_path '{}' must start with '/'",
                self.jsonrpc_path
            ));
        }
        if self.timeout_seconds == 0 {
            problems.push("source.timeout_seconds must be > 0".to_string());
        }
        if self.order_states.is_empty() {
            problems.push("source.order_states must list at least one state".to_string());
        }
        if self.dimension_page_size == 0 {
            problems.push("source.dimension_page_size must be > 0".to_string());
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

    /// Full JSON-RPC endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.jsonrpc_path)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("jsonrpc_path", &self.jsonrpc_path)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("order_states", &self.order_states)
            .field("dimension_page_size", &self.dimension_page_size)
            .field("brand_field", &self.brand_field)
            .finish()
    }
}
