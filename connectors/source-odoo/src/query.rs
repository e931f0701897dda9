//! `search_read` request building.
//!
//! An Odoo domain is a list of `[field, operator, value]` triples, implicitly
//! AND-ed together.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

/// Odoo's wire format for datetimes (UTC, second precision).
pub const ODOO_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const ORDER_MODEL: &str = "pos.order";
pub const LINE_MODEL: &str = "pos.order.line";
pub const PRODUCT_MODEL: &str = "product.product";
pub const PARTNER_MODEL: &str = "res.partner";
pub const PAYMENT_MODEL: &str = "pos.payment";

pub const ORDER_FIELDS: &[&str] = &[
    "id",
    "name",
    "date_order",
    "config_id",
    "partner_id",
    "amount_total",
    "amount_paid",
    "amount_tax",
    "state",
    "payment_ids",
    "write_date",
];

pub const LINE_FIELDS: &[&str] = &[
    "id",
    "order_id",
    "product_id",
    "qty",
    "price_unit",
    "price_subtotal",
    "price_subtotal_incl",
    "discount",
];

pub const PRODUCT_FIELDS: &[&str] = &[
    "id",
    "name",
    "default_code",
    "categ_id",
    "list_price",
    "active",
];

pub const PARTNER_FIELDS: &[&str] = &[
    "id",
    "name",
    "type",
    "city",
    "x_region_code",
    "x_province",
    "x_barangay",
    "write_date",
];

pub const PAYMENT_FIELDS: &[&str] = &["id", "payment_method_id", "amount"];

/// Conjunction of `[field, operator, value]` predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain(Vec<Value>);

impl Domain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn equals(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, "=", value.into())
    }

    #[must_use]
    pub fn one_of<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.push(field, "in", Value::Array(values))
    }

    /// `field > since` in Odoo datetime format.
    #[must_use]
    pub fn modified_after(self, field: &str, since: DateTime<Utc>) -> Self {
        let formatted = since.format(ODOO_DATETIME_FORMAT).to_string();
        self.push(field, ">", Value::String(formatted))
    }

    fn push(mut self, field: &str, op: &str, value: Value) -> Self {
        self.0.push(json!([field, op, value]));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Array(self.0)
    }
}

/// One `search_read` call against a model.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRead {
    pub model: &'static str,
    pub domain: Domain,
    pub fields: Vec<String>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub order: Option<&'static str>,
}

impl SearchRead {
    #[must_use]
    pub fn new(model: &'static str, domain: Domain, fields: &[&str]) -> Self {
        Self {
            model,
            domain,
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            limit: None,
            offset: 0,
            order: None,
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: &str) -> Self {
        self.fields.push(field.to_string());
        self
    }

    #[must_use]
    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn ordered_by(mut self, order: &'static str) -> Self {
        self.order = Some(order);
        self
    }

    /// Positional arguments for `execute_kw` after the credentials:
    /// `[model, "search_read", [domain], kwargs]`.
    #[must_use]
    pub fn to_execute_args(&self) -> Vec<Value> {
        let mut kwargs = Map::new();
        kwargs.insert("fields".into(), json!(self.fields));
        if let Some(limit) = self.limit {
            kwargs.insert("limit".into(), json!(limit));
        }
        if self.offset > 0 {
            kwargs.insert("offset".into(), json!(self.offset));
        }
        if let Some(order) = self.order {
            kwargs.insert("order".into(), json!(order));
        }
        vec![
            json!(self.model),
            json!("search_read"),
            json!([self.domain.clone().into_value()]),
            Value::Object(kwargs),
        ]
    }
}
