//! Typed source records.
//!
//! These are the validated shapes produced at the extraction boundary.
//! Fields the source may omit are explicit `Option`s; nothing downstream
//! looks values up by key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to another source record: its id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub id: i64,
    pub name: String,
}

impl Reference {
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A point-of-sale order header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOrder {
    pub id: i64,
    /// Human-facing order reference (e.g. `"Shop/0042"`).
    pub name: Option<String>,
    pub date_order: Option<DateTime<Utc>>,
    /// POS configuration the order was rung up on; identifies the store.
    pub config: Option<Reference>,
    pub partner: Option<Reference>,
    pub amount_total: f64,
    pub amount_paid: f64,
    pub amount_tax: f64,
    pub state: String,
    pub payment_ids: Vec<i64>,
    /// Last-modified timestamp; drives the incremental watermark.
    pub write_date: Option<DateTime<Utc>>,
    /// The row exactly as the source returned it.
    #[serde(default)]
    pub raw: Value,
}

/// One line item under a [`SourceOrder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOrderLine {
    pub id: i64,
    pub order_id: i64,
    pub product: Option<Reference>,
    pub qty: f64,
    pub price_unit: f64,
    pub price_subtotal: f64,
    pub price_subtotal_incl: f64,
    /// Discount percentage, `None` when the line carries no discount.
    pub discount: Option<f64>,
    /// The row exactly as the source returned it.
    #[serde(default)]
    pub raw: Value,
}

/// Product dimension record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProduct {
    pub id: i64,
    pub name: Option<String>,
    pub default_code: Option<String>,
    pub category: Option<Reference>,
    /// Explicit brand link, when the brand extension is installed.
    pub brand: Option<Reference>,
    pub list_price: f64,
    pub active: bool,
}

/// Partner (customer/store) dimension record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePartner {
    pub id: i64,
    pub name: Option<String>,
    pub partner_type: Option<String>,
    pub city: Option<String>,
    pub region_code: Option<String>,
    pub province: Option<String>,
    pub barangay: Option<String>,
    pub write_date: Option<DateTime<Utc>>,
}

/// A payment recorded against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePayment {
    pub id: i64,
    pub method: Option<Reference>,
    pub amount: f64,
}

impl SourcePayment {
    /// Display name of the payment method, if known.
    #[must_use]
    pub fn method_name(&self) -> Option<&str> {
        self.method.as_ref().map(|m| m.name.as_str())
    }
}
