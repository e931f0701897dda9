//! Config loading: YAML with `${VAR}` substitution, or the environment.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;

use crate::config::types::SyncConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

pub const ODOO_BASE_URL: &str = "ODOO_BASE_URL";
pub const ODOO_DB: &str = "ODOO_DB";
pub const ODOO_USERNAME: &str = "ODOO_USERNAME";
pub const ODOO_PASSWORD: &str = "ODOO_PASSWORD";
pub const ODOO_JSONRPC_PATH: &str = "ODOO_JSONRPC_PATH";
pub const SUPABASE_URL: &str = "SUPABASE_URL";
pub const SUPABASE_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Variables that must be set when configuring from the environment.
pub const REQUIRED_ENV_VARS: &[&str] = &[
    ODOO_BASE_URL,
    ODOO_DB,
    ODOO_USERNAME,
    ODOO_PASSWORD,
    SUPABASE_URL,
    SUPABASE_SERVICE_ROLE_KEY,
];

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with<F>(input: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match lookup(var_name) {
            Some(val) => result = result.replace(&cap[0], &val),
            None => {
                if !missing.iter().any(|m| m == var_name) {
                    missing.push(var_name.to_string());
                }
            }
        }
    }

    if !missing.is_empty() {
        bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result)
}

/// Parse a sync config YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_config_str(yaml_str: &str) -> Result<SyncConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    serde_yaml::from_str(&substituted).context("Failed to parse sync config YAML")
}

/// Parse a sync config YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_config(path: &Path) -> Result<SyncConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
}

/// Build the config from process environment variables.
///
/// # Errors
///
/// Returns an error naming every required variable that is unset or empty.
pub fn config_from_env() -> Result<SyncConfig> {
    config_from_lookup(|name| std::env::var(name).ok())
}

/// Build the config from an arbitrary variable lookup. Empty values count
/// as unset.
///
/// # Errors
///
/// Returns an error naming every required variable that is missing.
pub fn config_from_lookup<F>(lookup: F) -> Result<SyncConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let missing: Vec<&str> = REQUIRED_ENV_VARS
        .iter()
        .copied()
        .filter(|&name| get(name).is_none())
        .collect();
    if !missing.is_empty() {
        bail!(
            "Missing required environment variable(s): {}",
            missing.join(", ")
        );
    }
    let required = |name: &str| get(name).unwrap_or_default();

    let mut source = source_odoo::Config::new(
        required(ODOO_BASE_URL),
        required(ODOO_DB),
        required(ODOO_USERNAME),
        required(ODOO_PASSWORD),
    );
    if let Some(path) = get(ODOO_JSONRPC_PATH) {
        source.jsonrpc_path = path;
    }
    let sink =
        dest_supabase::Config::new(required(SUPABASE_URL), required(SUPABASE_SERVICE_ROLE_KEY));
    Ok(SyncConfig::new(source, sink))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::types::StateBackendKind;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            (ODOO_BASE_URL, "https://erp.example.com"),
            (ODOO_DB, "prod"),
            (ODOO_USERNAME, "etl"),
            (ODOO_PASSWORD, "secret"),
            (SUPABASE_URL, "https://abc.supabase.co"),
            (SUPABASE_SERVICE_ROLE_KEY, "service-key"),
        ])
    }

    #[test]
    fn test_env_var_substitution() {
        let vars = env(&[("SCOUT_TEST_HOST", "erp.example.com")]);
        let result =
            substitute_with("base_url: https://${SCOUT_TEST_HOST}", |n| vars.get(n).cloned())
                .unwrap();
        assert_eq!(result, "base_url: https://erp.example.com");
    }

    #[test]
    fn test_process_env_substitution() {
        std::env::set_var("SCOUT_TEST_PROCESS_VAR", "alpha");
        let result = substitute_env_vars("${SCOUT_TEST_PROCESS_VAR} and more").unwrap();
        assert_eq!(result, "alpha and more");
        std::env::remove_var("SCOUT_TEST_PROCESS_VAR");
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "stream: odoo_pos_sync";
        assert_eq!(substitute_with(input, |_| None).unwrap(), input);
    }

    #[test]
    fn test_multiple_missing_env_vars_all_reported_once() {
        let input = "${SCOUT_MISSING_X} ${SCOUT_MISSING_Y} ${SCOUT_MISSING_X}";
        let err = substitute_with(input, |_| None)
            .unwrap_err()
            .to_string();
        assert_eq!(
            err,
            "Missing environment variable(s): SCOUT_MISSING_X, SCOUT_MISSING_Y"
        );
    }

    #[test]
    fn test_parse_config_from_string() {
        std::env::set_var("SCOUT_TEST_ODOO_PASS", "pw");
        std::env::set_var("SCOUT_TEST_SUPABASE_KEY", "key");
        let yaml = r"
stream: store_sync
source:
  base_url: https://erp.example.com
  database: prod
  username: etl
  password: ${SCOUT_TEST_ODOO_PASS}
  order_states: [paid]
sink:
  url: https://abc.supabase.co
  service_key: ${SCOUT_TEST_SUPABASE_KEY}
state:
  backend: sqlite
  path: /var/lib/scout/state.db
transform:
  tracked_brands: [Milo]
resources:
  batch_size: 250
";
        let config = parse_config_str(yaml).unwrap();
        assert_eq!(config.stream, "store_sync");
        assert_eq!(config.source.password, "pw");
        assert_eq!(config.source.order_states, vec!["paid"]);
        assert_eq!(config.sink.service_key, "key");
        assert_eq!(config.sink.schema, "scout");
        assert_eq!(config.state.backend, StateBackendKind::Sqlite);
        assert_eq!(config.transform.tracked_brands, vec!["Milo"]);
        assert_eq!(config.transform.payment_rules.len(), 3);
        assert_eq!(config.resources.batch_size, 250);
        assert_eq!(config.resources.max_retries, 3);
        std::env::remove_var("SCOUT_TEST_ODOO_PASS");
        std::env::remove_var("SCOUT_TEST_SUPABASE_KEY");
    }

    #[test]
    fn test_parse_invalid_yaml_errors() {
        assert!(parse_config_str("this is not: [valid: yaml: {{{}}}").is_err());
    }

    #[test]
    fn test_parse_config_file_not_found() {
        let err = parse_config(Path::new("/nonexistent/sync.yaml"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("Failed to read config file"));
    }

    #[test]
    fn test_from_lookup_builds_defaults() {
        let vars = full_env();
        let config = config_from_lookup(|n| vars.get(n).cloned()).unwrap();
        assert_eq!(config.stream, "odoo_pos_sync");
        assert_eq!(config.source.endpoint(), "https://erp.example.com/jsonrpc");
        assert_eq!(config.sink.service_key, "service-key");
        assert_eq!(config.resources.batch_size, 500);
    }

    #[test]
    fn test_from_lookup_custom_jsonrpc_path() {
        let mut vars = full_env();
        vars.insert(ODOO_JSONRPC_PATH.into(), "/odoo/jsonrpc".into());
        let config = config_from_lookup(|n| vars.get(n).cloned()).unwrap();
        assert_eq!(config.source.endpoint(), "https://erp.example.com/odoo/jsonrpc");
    }

    #[test]
    fn test_from_lookup_reports_all_missing() {
        let mut vars = full_env();
        vars.remove(ODOO_PASSWORD);
        vars.insert(SUPABASE_URL.into(), "  ".into());
        let err = config_from_lookup(|n| vars.get(n).cloned())
            .unwrap_err()
            .to_string();
        assert!(err.contains(ODOO_PASSWORD), "{err}");
        assert!(err.contains(SUPABASE_URL), "{err}");
        assert!(!err.contains(ODOO_DB), "{err}");
    }
}
