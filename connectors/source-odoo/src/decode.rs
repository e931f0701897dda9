//! Odoo row decoding.
//!
//! Odoo encodes "no value" as `false` for every field type and many-to-one
//! references as `[id, "display name"]`. The raw row structs below absorb
//! those conventions so the typed records never see them.

use chrono::{DateTime, NaiveDateTime, Utc};
use scout_types::connector::{Fetched, RejectedRow};
use scout_types::error::ConnectorError;
use scout_types::record::{
    Reference, SourceOrder, SourceOrderLine, SourcePartner, SourcePayment, SourceProduct,
};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::query::{
    LINE_MODEL, ODOO_DATETIME_FORMAT, ORDER_MODEL, PARTNER_MODEL, PAYMENT_MODEL, PRODUCT_MODEL,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum Falsy<T> {
    Flag(bool),
    Value(T),
}

fn falsy<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    match Option::<Falsy<T>>::deserialize(deserializer)? {
        None | Some(Falsy::Flag(false)) => Ok(None),
        Some(Falsy::Flag(true)) => Err(D::Error::custom("unexpected `true` for a valued field")),
        Some(Falsy::Value(value)) => Ok(Some(value)),
    }
}

fn falsy_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(falsy::<D, f64>(deserializer)?.unwrap_or(0.0))
}

fn many2one<'de, D>(deserializer: D) -> Result<Option<Reference>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(falsy::<D, (i64, String)>(deserializer)?.map(|(id, name)| Reference::new(id, name)))
}

fn datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match falsy::<D, String>(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_datetime(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime '{raw}'"))),
    }
}

/// Parse an Odoo datetime string. Naive values are UTC.
pub(crate) fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, ODOO_DATETIME_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Deserialize)]
struct OrderRow {
    id: i64,
    #[serde(default, deserialize_with = "falsy")]
    name: Option<String>,
    #[serde(default, deserialize_with = "datetime")]
    date_order: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "many2one")]
    config_id: Option<Reference>,
    #[serde(default, deserialize_with = "many2one")]
    partner_id: Option<Reference>,
    #[serde(default, deserialize_with = "falsy_number")]
    amount_total: f64,
    #[serde(default, deserialize_with = "falsy_number")]
    amount_paid: f64,
    #[serde(default, deserialize_with = "falsy_number")]
    amount_tax: f64,
    #[serde(default, deserialize_with = "falsy")]
    state: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    payment_ids: Option<Vec<i64>>,
    #[serde(default, deserialize_with = "datetime")]
    write_date: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, raw: Value) -> SourceOrder {
        SourceOrder {
            id: self.id,
            name: self.name,
            date_order: self.date_order,
            config: self.config_id,
            partner: self.partner_id,
            amount_total: self.amount_total,
            amount_paid: self.amount_paid,
            amount_tax: self.amount_tax,
            state: self.state.unwrap_or_default(),
            payment_ids: self.payment_ids.unwrap_or_default(),
            write_date: self.write_date,
            raw,
        }
    }
}

#[derive(Deserialize)]
struct LineRow {
    id: i64,
    #[serde(default, deserialize_with = "many2one")]
    order_id: Option<Reference>,
    #[serde(default, deserialize_with = "many2one")]
    product_id: Option<Reference>,
    #[serde(default, deserialize_with = "falsy_number")]
    qty: f64,
    #[serde(default, deserialize_with = "falsy_number")]
    price_unit: f64,
    #[serde(default, deserialize_with = "falsy_number")]
    price_subtotal: f64,
    #[serde(default, deserialize_with = "falsy_number")]
    price_subtotal_incl: f64,
    #[serde(default, deserialize_with = "falsy")]
    discount: Option<f64>,
}

#[derive(Deserialize)]
struct ProductRow {
    id: i64,
    #[serde(default, deserialize_with = "falsy")]
    name: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    default_code: Option<String>,
    #[serde(default, deserialize_with = "many2one")]
    categ_id: Option<Reference>,
    #[serde(default, deserialize_with = "falsy_number")]
    list_price: f64,
    #[serde(default = "active_default")]
    active: bool,
}

fn active_default() -> bool {
    true
}

#[derive(Deserialize)]
struct PartnerRow {
    id: i64,
    #[serde(default, deserialize_with = "falsy")]
    name: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "falsy")]
    partner_type: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    city: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    x_region_code: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    x_province: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    x_barangay: Option<String>,
    #[serde(default, deserialize_with = "datetime")]
    write_date: Option<DateTime<Utc>>,
}

impl From<PartnerRow> for SourcePartner {
    fn from(row: PartnerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            partner_type: row.partner_type,
            city: row.city,
            region_code: row.x_region_code,
            province: row.x_province,
            barangay: row.x_barangay,
            write_date: row.write_date,
        }
    }
}

#[derive(Deserialize)]
struct PaymentRow {
    id: i64,
    #[serde(default, deserialize_with = "many2one")]
    payment_method_id: Option<Reference>,
    #[serde(default, deserialize_with = "falsy_number")]
    amount: f64,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct Many2One(#[serde(deserialize_with = "many2one")] Option<Reference>);

fn decode_row<T: DeserializeOwned>(model: &str, row: &Value) -> Result<T, ConnectorError> {
    let id = row.get("id").cloned().unwrap_or(Value::Null);
    T::deserialize(row).map_err(|e| {
        ConnectorError::data("DECODE_FAILED", format!("{model} record {id}: {e}"))
    })
}

/// Decode every row on its own; failures are set aside, not propagated.
fn decode_each<T, F>(model: &str, rows: Vec<Value>, mut decode: F) -> Fetched<Vec<T>>
where
    F: FnMut(Value) -> Result<T, ConnectorError>,
{
    let mut fetched = Fetched::new(Vec::with_capacity(rows.len()));
    for row in rows {
        let id = row.get("id").and_then(Value::as_i64);
        let order_id = row
            .get("order_id")
            .and_then(|order| order.get(0))
            .and_then(Value::as_i64);
        let write_date = row
            .get("write_date")
            .and_then(Value::as_str)
            .and_then(parse_datetime);
        match decode(row) {
            Ok(record) => fetched.records.push(record),
            Err(error) => {
                tracing::warn!(model, id = ?id, error = %error, "Rejecting undecodable row");
                fetched.rejected.push(RejectedRow {
                    model: model.to_string(),
                    id,
                    order_id,
                    write_date,
                    error,
                });
            }
        }
    }
    fetched
}

pub(crate) fn orders(rows: Vec<Value>) -> Fetched<Vec<SourceOrder>> {
    decode_each(ORDER_MODEL, rows, |row| {
        let order: OrderRow = decode_row(ORDER_MODEL, &row)?;
        Ok(order.into_order(row))
    })
}

pub(crate) fn lines(rows: Vec<Value>) -> Fetched<Vec<SourceOrderLine>> {
    decode_each(LINE_MODEL, rows, |row| {
        let line: LineRow = decode_row(LINE_MODEL, &row)?;
        let order = line.order_id.ok_or_else(|| {
            ConnectorError::data(
                "MISSING_ORDER",
                format!("{LINE_MODEL} record {} has no order_id", line.id),
            )
        })?;
        Ok(SourceOrderLine {
            id: line.id,
            order_id: order.id,
            product: line.product_id,
            qty: line.qty,
            price_unit: line.price_unit,
            price_subtotal: line.price_subtotal,
            price_subtotal_incl: line.price_subtotal_incl,
            discount: line.discount,
            raw: row,
        })
    })
}

/// Decode products, reading the brand from `brand_field` when configured.
pub(crate) fn products(
    rows: Vec<Value>,
    brand_field: Option<&str>,
) -> Fetched<Vec<SourceProduct>> {
    decode_each(PRODUCT_MODEL, rows, |row| {
        let brand = match brand_field.and_then(|field| row.get(field)) {
            Some(raw) => decode_row::<Many2One>(PRODUCT_MODEL, raw)?.0,
            None => None,
        };
        let product: ProductRow = decode_row(PRODUCT_MODEL, &row)?;
        Ok(SourceProduct {
            id: product.id,
            name: product.name,
            default_code: product.default_code,
            category: product.categ_id,
            brand,
            list_price: product.list_price,
            active: product.active,
        })
    })
}

pub(crate) fn partners(rows: Vec<Value>) -> Fetched<Vec<SourcePartner>> {
    decode_each(PARTNER_MODEL, rows, |row| {
        decode_row::<PartnerRow>(PARTNER_MODEL, &row).map(SourcePartner::from)
    })
}

pub(crate) fn payments(rows: Vec<Value>) -> Fetched<Vec<SourcePayment>> {
    decode_each(PAYMENT_MODEL, rows, |row| {
        let payment: PaymentRow = decode_row(PAYMENT_MODEL, &row)?;
        Ok(SourcePayment {
            id: payment.id,
            method: payment.payment_method_id,
            amount: payment.amount,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, 0).unwrap()
    }

    #[rstest]
    #[case("2025-03-01 08:15:00", utc(8, 15))]
    #[case("2025-03-01 08:15:00.250", utc(8, 15) + chrono::Duration::milliseconds(250))]
    #[case("2025-03-01T16:15:00+08:00", utc(8, 15))]
    fn datetime_formats(#[case] raw: &str, #[case] expected: DateTime<Utc>) {
        assert_eq!(parse_datetime(raw), Some(expected));
    }

    #[test]
    fn garbage_datetime_is_rejected() {
        assert_eq!(parse_datetime("yesterday"), None);
        let fetched = orders(vec![json!({"id": 1, "write_date": "yesterday"})]);
        assert!(fetched.records.is_empty());
        let rejected = &fetched.rejected[0];
        assert_eq!(rejected.error.code, "DECODE_FAILED");
        assert_eq!(rejected.id, Some(1));
        assert_eq!(rejected.write_date, None);
        assert!(
            rejected.error.message.contains("pos.order record 1"),
            "{}",
            rejected.error.message
        );
    }

    #[test]
    fn bad_order_row_does_not_drop_its_page() {
        let fetched = orders(vec![
            json!({"id": 1, "state": "paid", "write_date": "2025-03-01 09:05:00"}),
            json!({
                "id": 2,
                "state": "paid",
                "date_order": "01/03/2025",
                "write_date": "2025-03-01 09:06:00",
            }),
        ]);
        assert_eq!(fetched.records.len(), 1);
        assert_eq!(fetched.records[0].id, 1);
        assert_eq!(fetched.rejected.len(), 1);
        let rejected = &fetched.rejected[0];
        assert_eq!(rejected.model, "pos.order");
        assert_eq!(rejected.id, Some(2));
        assert_eq!(rejected.write_date, Some(utc(9, 6)));
        assert!(rejected.error.message.contains("01/03/2025"));
    }

    #[test]
    fn order_with_false_fields_decodes_to_none() {
        let row = json!({
            "id": 42,
            "name": "Shop/0042",
            "date_order": "2025-03-01 09:30:00",
            "config_id": [3, "Main Register"],
            "partner_id": false,
            "amount_total": 150.0,
            "amount_paid": 150.0,
            "amount_tax": false,
            "state": "paid",
            "payment_ids": [11, 12],
            "write_date": "2025-03-01 09:31:00",
        });
        let decoded = orders(vec![row.clone()]);
        assert!(decoded.rejected.is_empty());
        let order = &decoded.records[0];
        assert_eq!(order.id, 42);
        assert_eq!(order.config, Some(Reference::new(3, "Main Register")));
        assert_eq!(order.partner, None);
        assert!(order.amount_tax.abs() < f64::EPSILON);
        assert_eq!(order.payment_ids, vec![11, 12]);
        assert_eq!(order.state, "paid");
        assert_eq!(order.raw, row);
    }

    #[test]
    fn line_requires_order_reference() {
        let fetched = lines(vec![
            json!({
                "id": 1,
                "order_id": [42, "Shop/0042"],
                "product_id": [7, "Coca-Cola 330ml"],
                "qty": 2.0,
                "price_unit": 25.0,
                "price_subtotal": 50.0,
                "price_subtotal_incl": 56.0,
                "discount": false,
            }),
            json!({"id": 2, "order_id": false}),
            json!({"id": 3, "order_id": [43, "Shop/0043"], "qty": "two"}),
        ]);
        let ok = &fetched.records;
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].order_id, 42);
        assert_eq!(ok[0].discount, None);
        assert_eq!(ok[0].product.as_ref().map(|p| p.id), Some(7));
        assert_eq!(ok[0].raw["price_subtotal_incl"], 56.0);

        assert_eq!(fetched.rejected.len(), 2);
        assert_eq!(fetched.rejected[0].error.code, "MISSING_ORDER");
        assert_eq!(fetched.rejected[0].order_id, None);
        assert_eq!(fetched.rejected[1].error.code, "DECODE_FAILED");
        assert_eq!(fetched.rejected[1].order_id, Some(43));
    }

    #[test]
    fn product_brand_read_from_configured_field() {
        let rows = vec![json!({
            "id": 7,
            "name": "Coca-Cola 330ml",
            "default_code": false,
            "categ_id": [2, "Beverages"],
            "list_price": 25.0,
            "active": true,
            "x_brand": [9, "Coca-Cola"],
        })];
        let with_brand = products(rows.clone(), Some("x_brand")).records;
        assert_eq!(with_brand[0].brand, Some(Reference::new(9, "Coca-Cola")));
        assert_eq!(with_brand[0].default_code, None);

        let without = products(rows, None).records;
        assert_eq!(without[0].brand, None);
        assert_eq!(
            without[0].category.as_ref().map(|c| c.name.as_str()),
            Some("Beverages")
        );
    }

    #[test]
    fn partner_custom_geography_fields() {
        let decoded = partners(vec![json!({
            "id": 5,
            "name": "Juan",
            "type": "contact",
            "city": "Quezon City",
            "x_region_code": "NCR",
            "x_province": false,
            "x_barangay": "Bagumbayan",
        })]);
        let partner = &decoded.records[0];
        assert_eq!(partner.region_code.as_deref(), Some("NCR"));
        assert_eq!(partner.province, None);
        assert_eq!(partner.barangay.as_deref(), Some("Bagumbayan"));
        assert_eq!(partner.partner_type.as_deref(), Some("contact"));
    }

    #[test]
    fn payment_method_name() {
        let decoded = payments(vec![
            json!({"id": 11, "payment_method_id": [1, "GCash"], "amount": 150.0}),
            json!({"id": 12, "payment_method_id": "GCash"}),
        ]);
        assert_eq!(decoded.records[0].method_name(), Some("GCash"));
        assert_eq!(decoded.rejected[0].id, Some(12));
    }
}
