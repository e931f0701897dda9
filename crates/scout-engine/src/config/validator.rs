//! Semantic validation for parsed sync configuration values.

use anyhow::{bail, Result};

use crate::config::types::{PaymentRule, StateBackendKind, SyncConfig};

fn validate_payment_rules(rules: &[PaymentRule], errors: &mut Vec<String>) {
    for (i, rule) in rules.iter().enumerate() {
        if rule.patterns.is_empty() {
            errors.push(format!(
                "transform.payment_rules[{i}] ({}) has no patterns",
                rule.method
            ));
        }
        if rule.patterns.iter().any(|p| p.trim().is_empty()) {
            errors.push(format!(
                "transform.payment_rules[{i}] ({}) has an empty pattern",
                rule.method
            ));
        }
    }
}

/// Validate a parsed sync configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the config.
pub fn validate_config(config: &SyncConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.stream.trim().is_empty() {
        errors.push("stream must not be empty".to_string());
    }

    errors.extend(config.source.problems());
    errors.extend(config.sink.problems());

    if config.state.backend == StateBackendKind::Sqlite && config.state.path.is_none() {
        errors.push("state.backend 'sqlite' requires state.path".to_string());
    }

    if config.transform.source_system.trim().is_empty() {
        errors.push("transform.source_system must not be empty".to_string());
    }
    if config.transform.tracked_brands.iter().any(|b| b.trim().is_empty()) {
        errors.push("transform.tracked_brands must not contain empty names".to_string());
    }
    validate_payment_rules(&config.transform.payment_rules, &mut errors);

    if config.resources.batch_size == 0 {
        errors.push("resources.batch_size must be at least 1".to_string());
    }

    if !errors.is_empty() {
        bail!("Config validation failed:\n  - {}", errors.join("\n  - "));
    }

    Ok(())
}
