//! Field-level classification rules used by the transformer.

use std::collections::HashSet;

use chrono::{DateTime, Timelike, Utc};
use scout_types::record::SourceProduct;
use scout_types::transaction::{PaymentMethod, TimeOfDay};

use crate::config::types::PaymentRule;

/// Placeholder for unresolvable brand and category names.
pub const UNKNOWN: &str = "Unknown";

/// Hour assumed when an order carries no timestamp.
const DEFAULT_HOUR: u32 = 12;

/// Bucket an order timestamp (UTC hour). Missing timestamps count as noon.
#[must_use]
pub fn time_of_day(timestamp: Option<DateTime<Utc>>) -> TimeOfDay {
    TimeOfDay::from_hour(timestamp.map_or(DEFAULT_HOUR, |ts| ts.hour()))
}

/// Ordered payment rules with patterns pre-lowercased.
#[derive(Debug, Clone)]
pub struct PaymentClassifier {
    rules: Vec<(PaymentMethod, Vec<String>)>,
}

impl PaymentClassifier {
    #[must_use]
    pub fn new(rules: &[PaymentRule]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|rule| {
                    let patterns = rule.patterns.iter().map(|p| p.to_lowercase()).collect();
                    (rule.method, patterns)
                })
                .collect(),
        }
    }

    /// First rule with a pattern contained in the name wins; otherwise cash.
    #[must_use]
    pub fn classify(&self, method_name: Option<&str>) -> PaymentMethod {
        let Some(name) = method_name else {
            return PaymentMethod::Cash;
        };
        let name = name.to_lowercase();
        self.rules
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| name.contains(p.as_str())))
            .map_or(PaymentMethod::Cash, |(method, _)| *method)
    }
}

/// Case-insensitive tracked-brand membership.
#[derive(Debug, Clone, Default)]
pub struct TrackedBrands(HashSet<String>);

impl TrackedBrands {
    pub fn new<I, S>(brands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(brands.into_iter().map(|b| b.as_ref().to_lowercase()).collect())
    }

    #[must_use]
    pub fn contains(&self, brand: &str) -> bool {
        self.0.contains(&brand.to_lowercase())
    }
}

/// Explicit brand link, else the first word of the product name.
#[must_use]
pub fn brand_name(product: Option<&SourceProduct>) -> String {
    let Some(product) = product else {
        return UNKNOWN.to_string();
    };
    if let Some(brand) = &product.brand {
        return brand.name.clone();
    }
    product
        .name
        .as_deref()
        .and_then(|name| name.split_whitespace().next())
        .unwrap_or(UNKNOWN)
        .to_string()
}

#[must_use]
pub fn category_name(product: Option<&SourceProduct>) -> String {
    product
        .and_then(|p| p.category.as_ref())
        .map_or_else(|| UNKNOWN.to_string(), |c| c.name.clone())
}
