//! The canonical bronze transaction record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed hour-of-day bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Bucket an hour (0-23): morning before 12, afternoon before 17,
    /// evening before 21, night otherwise.
    #[must_use]
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

/// Normalized payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Gcash,
    Maya,
    Card,
}

impl PaymentMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Gcash => "gcash",
            Self::Maya => "maya",
            Self::Card => "card",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Funnel stage of a transaction. Only purchases are synced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStage {
    #[default]
    Purchase,
}

/// Build the idempotency key `"{source_system}-{order_id}-{line_id}"`.
#[must_use]
pub fn natural_key(source_system: &str, order_id: i64, line_id: i64) -> String {
    format!("{source_system}-{order_id}-{line_id}")
}

/// One bronze-layer row: a source order line joined with its order and
/// dimension data.
///
/// Serialized field names are the bronze table's column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    /// Conflict key for idempotent upserts.
    #[serde(rename = "source_id")]
    pub natural_key: String,
    pub source_system: String,
    pub transaction_code: String,
    pub store_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub time_of_day: TimeOfDay,
    pub region_code: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub barangay: Option<String>,
    pub brand_name: String,
    pub sku: String,
    #[serde(rename = "product_category")]
    pub category: String,
    #[serde(rename = "tbwa_client_brand")]
    pub is_tracked_brand: bool,
    pub quantity: i64,
    pub unit_price: f64,
    pub gross_amount: f64,
    pub discount_amount: f64,
    pub net_amount: f64,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<String>,
    pub funnel_stage: FunnelStage,
    pub basket_size: u32,
    pub synced_at: DateTime<Utc>,
    /// Source payload: `{"order": .., "line": ..}` as extracted.
    pub raw_data: serde_json::Value,
    /// Parent order's last-modified timestamp. Not a bronze column.
    #[serde(skip)]
    pub source_updated_at: Option<DateTime<Utc>>,
}
