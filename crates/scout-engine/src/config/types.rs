//! Sync configuration types.

use std::path::PathBuf;

use scout_types::transaction::PaymentMethod;
use serde::Deserialize;

/// Default checkpoint id for the POS order stream.
pub const DEFAULT_STREAM: &str = "odoo_pos_sync";

/// Brands flagged as belonging to the monitored client portfolio.
pub const DEFAULT_TRACKED_BRANDS: &[&str] = &[
    "Coca-Cola",
    "Sprite",
    "Royal Tru-Orange",
    "Nestea",
    "Milo",
    "Nescafe",
    "Oishi",
    "Piattos",
    "Marlboro",
    "Philip Morris",
    "Del Monte",
    "Century Tuna",
];

/// Top-level sync configuration.
///
/// Built once at the entry point and passed down explicitly; nothing below
/// the CLI reads the process environment.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_stream")]
    pub stream: String,
    pub source: source_odoo::Config,
    pub sink: dest_supabase::Config,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
}

fn default_stream() -> String {
    DEFAULT_STREAM.to_string()
}

impl SyncConfig {
    /// Config with defaults for everything except the two connections.
    #[must_use]
    pub fn new(source: source_odoo::Config, sink: dest_supabase::Config) -> Self {
        Self {
            stream: default_stream(),
            source,
            sink,
            state: StateConfig::default(),
            transform: TransformConfig::default(),
            resources: ResourceConfig::default(),
        }
    }
}

/// Where checkpoints and run logs are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackendKind {
    /// The sink database's checkpoint and log tables.
    #[default]
    Supabase,
    /// A local `SQLite` file.
    Sqlite,
}

/// State backend configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackendKind,
    /// Database path, required for the `sqlite` backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// One payment normalization rule: any pattern found in the method name
/// (case-insensitive) maps the payment to `method`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentRule {
    pub method: PaymentMethod,
    pub patterns: Vec<String>,
}

impl PaymentRule {
    #[must_use]
    pub fn new(method: PaymentMethod, patterns: &[&str]) -> Self {
        Self {
            method,
            patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

/// Default rule order: wallets before cards; no match is cash.
#[must_use]
pub fn default_payment_rules() -> Vec<PaymentRule> {
    vec![
        PaymentRule::new(PaymentMethod::Gcash, &["gcash"]),
        PaymentRule::new(PaymentMethod::Maya, &["maya", "paymaya"]),
        PaymentRule::new(PaymentMethod::Card, &["card", "credit", "debit"]),
    ]
}

/// Business policy applied by the record transformer.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformConfig {
    /// Natural-key prefix identifying this integration instance.
    #[serde(default = "default_source_system")]
    pub source_system: String,
    #[serde(default = "default_tracked_brands")]
    pub tracked_brands: Vec<String>,
    #[serde(default = "default_payment_rules")]
    pub payment_rules: Vec<PaymentRule>,
}

fn default_source_system() -> String {
    "odoo".to_string()
}

fn default_tracked_brands() -> Vec<String> {
    DEFAULT_TRACKED_BRANDS.iter().map(|b| (*b).to_string()).collect()
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            source_system: default_source_system(),
            tracked_brands: default_tracked_brands(),
            payment_rules: default_payment_rules(),
        }
    }
}

/// Batch sizing and retry limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    /// Orders fetched per run and rows per sink upsert.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Extra attempts for a retryable source read or sink batch.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Default batch size.
pub const DEFAULT_BATCH_SIZE: usize = 500;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_defaults() {
        let transform = TransformConfig::default();
        assert_eq!(transform.source_system, "odoo");
        assert_eq!(transform.tracked_brands.len(), 12);
        assert_eq!(transform.payment_rules[1].method, PaymentMethod::Maya);
        assert_eq!(transform.payment_rules[1].patterns, vec!["maya", "paymaya"]);
    }

    #[test]
    fn resource_defaults() {
        let resources = ResourceConfig::default();
        assert_eq!(resources.batch_size, 500);
        assert_eq!(resources.max_retries, 3);
    }

    #[test]
    fn state_backend_parses_lowercase() {
        let state: StateConfig =
            serde_yaml::from_str("backend: sqlite\npath: /tmp/state.db").unwrap();
        assert_eq!(state.backend, StateBackendKind::Sqlite);
        assert_eq!(state.path, Some(PathBuf::from("/tmp/state.db")));
        assert_eq!(StateConfig::default().backend, StateBackendKind::Supabase);
    }

    #[test]
    fn payment_rule_parses_snake_case_method() {
        let rule: PaymentRule =
            serde_yaml::from_str("method: gcash\npatterns: [gcash, g-cash]").unwrap();
        assert_eq!(rule.method, PaymentMethod::Gcash);
        assert_eq!(rule.patterns.len(), 2);
    }
}
