//! Record transformer: one source order plus its resolved dimensions into
//! canonical bronze transactions, one per product line.

pub mod classify;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use scout_types::record::{
    SourceOrder, SourceOrderLine, SourcePartner, SourcePayment, SourceProduct,
};
use scout_types::transaction::{natural_key, CanonicalTransaction, FunnelStage, PaymentMethod};
use serde_json::json;

use crate::config::types::TransformConfig;
use classify::{brand_name, category_name, time_of_day, PaymentClassifier, TrackedBrands};

/// Why one order could not be transformed. The order is skipped and the
/// error recorded; the rest of the batch continues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("line {line_id} belongs to order {found}, not {expected}")]
    LineOrderMismatch {
        line_id: i64,
        expected: i64,
        found: i64,
    },
    #[error("line {line_id}: {field} is not a finite number")]
    NonFiniteAmount { line_id: i64, field: &'static str },
    #[error("line {line_id}: quantity {qty} is out of range")]
    QuantityOutOfRange { line_id: i64, qty: f64 },
    #[error("order has {0} lines, too many for a basket")]
    BasketTooLarge(usize),
}

/// Dimension records resolved for one extraction batch.
#[derive(Debug, Clone, Default)]
pub struct Dimensions {
    pub products: HashMap<i64, SourceProduct>,
    pub partners: HashMap<i64, SourcePartner>,
    pub payments: HashMap<i64, SourcePayment>,
}

/// Business policy applied to every order.
#[derive(Debug, Clone)]
pub struct TransformPolicy {
    source_system: String,
    tracked_brands: TrackedBrands,
    payments: PaymentClassifier,
}

impl TransformPolicy {
    #[must_use]
    pub fn from_config(config: &TransformConfig) -> Self {
        Self {
            source_system: config.source_system.clone(),
            tracked_brands: TrackedBrands::new(&config.tracked_brands),
            payments: PaymentClassifier::new(&config.payment_rules),
        }
    }

    #[must_use]
    pub fn source_system(&self) -> &str {
        &self.source_system
    }

    /// Method of the first payment id that resolves to a payment record.
    fn payment_method(&self, order: &SourceOrder, dims: &Dimensions) -> PaymentMethod {
        let first = order
            .payment_ids
            .iter()
            .find_map(|id| dims.payments.get(id));
        self.payments.classify(first.and_then(SourcePayment::method_name))
    }
}

impl Default for TransformPolicy {
    fn default() -> Self {
        Self::from_config(&TransformConfig::default())
    }
}

fn finite(line_id: i64, field: &'static str, value: f64) -> Result<f64, TransformError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TransformError::NonFiniteAmount { line_id, field })
    }
}

/// Quantities are truncated toward zero.
#[allow(clippy::cast_possible_truncation)]
fn quantity(line: &SourceOrderLine) -> Result<i64, TransformError> {
    let qty = finite(line.id, "qty", line.qty)?.trunc();
    // i64::MAX is not representable as f64; its rounded value is exclusive.
    #[allow(clippy::cast_precision_loss)]
    let bound = i64::MAX as f64;
    if qty >= bound || qty < -bound {
        return Err(TransformError::QuantityOutOfRange {
            line_id: line.id,
            qty: line.qty,
        });
    }
    Ok(qty as i64)
}

/// Transform one order. Lines without a product reference produce no
/// transaction but still count towards the basket size.
///
/// # Errors
///
/// Returns a [`TransformError`] when any line is inconsistent; no partial
/// output is produced for the order.
pub fn transform_order(
    order: &SourceOrder,
    lines: &[SourceOrderLine],
    dims: &Dimensions,
    policy: &TransformPolicy,
    synced_at: DateTime<Utc>,
) -> Result<Vec<CanonicalTransaction>, TransformError> {
    let basket_size =
        u32::try_from(lines.len()).map_err(|_| TransformError::BasketTooLarge(lines.len()))?;
    let store_id = order.config.as_ref().map(|c| format!("ST-{}", c.id));
    let customer_id = order.partner.as_ref().map(|p| format!("CUST-{}", p.id));
    let partner = order
        .partner
        .as_ref()
        .and_then(|p| dims.partners.get(&p.id));
    let payment_method = policy.payment_method(order, dims);
    let bucket = time_of_day(order.date_order);

    let mut transactions = Vec::with_capacity(lines.len());
    for line in lines {
        if line.order_id != order.id {
            return Err(TransformError::LineOrderMismatch {
                line_id: line.id,
                expected: order.id,
                found: line.order_id,
            });
        }
        let Some(product_ref) = &line.product else {
            continue;
        };
        let product = dims.products.get(&product_ref.id);

        let quantity = quantity(line)?;
        let unit_price = finite(line.id, "price_unit", line.price_unit)?;
        let net_amount = finite(line.id, "price_subtotal_incl", line.price_subtotal_incl)?;
        #[allow(clippy::cast_precision_loss)]
        let discount_amount = match line.discount {
            Some(pct) if pct != 0.0 => {
                let pct = finite(line.id, "discount", pct)?;
                finite(line.id, "discount", unit_price * quantity as f64 * pct / 100.0)?
            }
            _ => 0.0,
        };

        let brand = brand_name(product);
        let sku = product
            .and_then(|p| p.default_code.clone())
            .unwrap_or_else(|| format!("SKU-{}", product_ref.id));

        transactions.push(CanonicalTransaction {
            natural_key: natural_key(&policy.source_system, order.id, line.id),
            source_system: policy.source_system.clone(),
            transaction_code: order.name.clone().unwrap_or_default(),
            store_id: store_id.clone(),
            timestamp: order.date_order,
            time_of_day: bucket,
            region_code: partner.and_then(|p| p.region_code.clone()),
            province: partner.and_then(|p| p.province.clone()),
            city: partner.and_then(|p| p.city.clone()),
            barangay: partner.and_then(|p| p.barangay.clone()),
            is_tracked_brand: policy.tracked_brands.contains(&brand),
            brand_name: brand,
            sku,
            category: category_name(product),
            quantity,
            unit_price,
            gross_amount: net_amount + discount_amount,
            discount_amount,
            net_amount,
            payment_method,
            customer_id: customer_id.clone(),
            funnel_stage: FunnelStage::Purchase,
            basket_size,
            synced_at,
            raw_data: json!({"order": order.raw, "line": line.raw}),
            source_updated_at: order.write_date,
        });
    }
    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scout_types::record::Reference;
    use scout_types::transaction::TimeOfDay;
    use serde_json::Value;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, 30, 0).unwrap()
    }

    fn order(id: i64) -> SourceOrder {
        SourceOrder {
            id,
            name: Some(format!("Shop/{id:04}")),
            date_order: Some(at(9)),
            config: Some(Reference::new(3, "Main Register")),
            partner: None,
            amount_total: 0.0,
            amount_paid: 0.0,
            amount_tax: 0.0,
            state: "paid".into(),
            payment_ids: Vec::new(),
            write_date: Some(at(10)),
            raw: json!({"id": id, "name": format!("Shop/{id:04}")}),
        }
    }

    fn line(id: i64, order_id: i64, product_id: Option<i64>, qty: f64) -> SourceOrderLine {
        SourceOrderLine {
            id,
            order_id,
            product: product_id.map(|p| Reference::new(p, "Coca-Cola 330ml")),
            qty,
            price_unit: 25.0,
            price_subtotal: 25.0 * qty,
            price_subtotal_incl: 28.0 * qty,
            discount: None,
            raw: Value::Null,
        }
    }

    fn dims() -> Dimensions {
        let mut dims = Dimensions::default();
        dims.products.insert(
            7,
            SourceProduct {
                id: 7,
                name: Some("Coca-Cola 330ml".into()),
                default_code: Some("COKE-330".into()),
                category: Some(Reference::new(2, "Beverages")),
                brand: None,
                list_price: 25.0,
                active: true,
            },
        );
        dims
    }

    fn run(
        order: &SourceOrder,
        lines: &[SourceOrderLine],
        dims: &Dimensions,
    ) -> Result<Vec<CanonicalTransaction>, TransformError> {
        transform_order(order, lines, dims, &TransformPolicy::default(), at(11))
    }

    #[test]
    fn two_line_order_without_partner_or_payments() {
        let order = order(42);
        let lines = vec![line(1, 42, Some(7), 1.0), line(2, 42, Some(7), 3.0)];
        let synced = at(11);
        let policy = TransformPolicy::default();
        let txs = transform_order(&order, &lines, &dims(), &policy, synced).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].natural_key, "odoo-42-1");
        assert_eq!(txs[1].natural_key, "odoo-42-2");
        assert_eq!(txs[0].raw_data["order"]["name"], "Shop/0042");
        assert_eq!(txs[0].raw_data["line"], Value::Null);
        for tx in &txs {
            assert_eq!(tx.payment_method, PaymentMethod::Cash);
            assert_eq!(tx.basket_size, 2);
            assert_eq!(tx.region_code, None);
            assert_eq!(tx.city, None);
            assert_eq!(tx.customer_id, None);
            assert_eq!(tx.store_id.as_deref(), Some("ST-3"));
            assert_eq!(tx.brand_name, "Coca-Cola");
            assert!(tx.is_tracked_brand);
            assert_eq!(tx.sku, "COKE-330");
            assert_eq!(tx.category, "Beverages");
            assert_eq!(tx.time_of_day, TimeOfDay::Morning);
            assert_eq!(tx.synced_at, synced);
            assert_eq!(tx.source_updated_at, Some(at(10)));
        }
        assert_eq!(txs[1].quantity, 3);
        assert!((txs[1].net_amount - 84.0).abs() < 1e-9);
        assert!((txs[1].gross_amount - 84.0).abs() < 1e-9);
    }

    #[test]
    fn discount_reconstructs_gross() {
        let order = order(5);
        let mut discounted = line(1, 5, Some(7), 2.0);
        discounted.discount = Some(10.0);
        discounted.price_subtotal_incl = 45.0;
        let txs = run(&order, &[discounted], &dims()).unwrap();
        assert!((txs[0].discount_amount - 5.0).abs() < 1e-9);
        assert!((txs[0].gross_amount - 50.0).abs() < 1e-9);
        assert!((txs[0].net_amount - 45.0).abs() < 1e-9);
    }

    #[test]
    fn lines_without_product_count_towards_basket() {
        let order = order(8);
        let lines = vec![
            line(1, 8, Some(7), 1.0),
            line(2, 8, None, 1.0),
            line(3, 8, Some(99), 1.0),
        ];
        let txs = run(&order, &lines, &dims()).unwrap();
        assert_eq!(txs.len(), 2);
        assert!(txs.iter().all(|tx| tx.basket_size == 3));
        let unknown = &txs[1];
        assert_eq!(unknown.natural_key, "odoo-8-3");
        assert_eq!(unknown.brand_name, "Unknown");
        assert_eq!(unknown.category, "Unknown");
        assert_eq!(unknown.sku, "SKU-99");
        assert!(!unknown.is_tracked_brand);
    }

    #[test]
    fn partner_geography_and_customer_id() {
        let mut order = order(9);
        order.partner = Some(Reference::new(5, "Juan"));
        let mut dims = dims();
        dims.partners.insert(
            5,
            SourcePartner {
                id: 5,
                city: Some("Quezon City".into()),
                region_code: Some("NCR".into()),
                barangay: Some("Bagumbayan".into()),
                ..SourcePartner::default()
            },
        );
        let txs = run(&order, &[line(1, 9, Some(7), 1.0)], &dims).unwrap();
        assert_eq!(txs[0].customer_id.as_deref(), Some("CUST-5"));
        assert_eq!(txs[0].region_code.as_deref(), Some("NCR"));
        assert_eq!(txs[0].province, None);
        assert_eq!(txs[0].barangay.as_deref(), Some("Bagumbayan"));
    }

    #[test]
    fn dangling_partner_yields_null_geography() {
        let mut order = order(9);
        order.partner = Some(Reference::new(404, "Ghost"));
        let txs = run(&order, &[line(1, 9, Some(7), 1.0)], &dims()).unwrap();
        assert_eq!(txs[0].customer_id.as_deref(), Some("CUST-404"));
        assert_eq!(txs[0].city, None);
        assert_eq!(txs[0].region_code, None);
    }

    #[test]
    fn first_resolvable_payment_decides_method() {
        let mut order = order(10);
        order.payment_ids = vec![100, 101, 102];
        let mut dims = dims();
        dims.payments.insert(
            101,
            SourcePayment {
                id: 101,
                method: Some(Reference::new(1, "GCash Wallet")),
                amount: 28.0,
            },
        );
        dims.payments.insert(
            102,
            SourcePayment {
                id: 102,
                method: Some(Reference::new(2, "Visa Credit Card")),
                amount: 0.0,
            },
        );
        let txs = run(&order, &[line(1, 10, Some(7), 1.0)], &dims).unwrap();
        assert_eq!(txs[0].payment_method, PaymentMethod::Gcash);
    }

    #[test]
    fn non_finite_amount_fails_whole_order() {
        let order = order(11);
        let mut bad = line(2, 11, Some(7), 1.0);
        bad.price_unit = f64::NAN;
        let err = run(&order, &[line(1, 11, Some(7), 1.0), bad], &dims()).unwrap_err();
        assert_eq!(
            err,
            TransformError::NonFiniteAmount {
                line_id: 2,
                field: "price_unit"
            }
        );
    }

    #[test]
    fn foreign_line_is_rejected() {
        let order = order(12);
        let err = run(&order, &[line(1, 13, Some(7), 1.0)], &dims()).unwrap_err();
        assert!(matches!(err, TransformError::LineOrderMismatch { found: 13, .. }));
    }

    #[test]
    fn fractional_quantity_truncates() {
        let order = order(14);
        let txs = run(&order, &[line(1, 14, Some(7), 2.7)], &dims()).unwrap();
        assert_eq!(txs[0].quantity, 2);
        let err = run(&order, &[line(2, 14, Some(7), 1e300)], &dims()).unwrap_err();
        assert!(matches!(err, TransformError::QuantityOutOfRange { line_id: 2, .. }));
    }

    #[test]
    fn missing_order_timestamp_defaults_to_afternoon() {
        let mut order = order(15);
        order.date_order = None;
        let txs = run(&order, &[line(1, 15, Some(7), 1.0)], &dims()).unwrap();
        assert_eq!(txs[0].time_of_day, TimeOfDay::Afternoon);
        assert_eq!(txs[0].timestamp, None);
    }

    #[test]
    fn custom_source_system_prefixes_key() {
        let config = TransformConfig {
            source_system: "odoo-ph".into(),
            ..TransformConfig::default()
        };
        let policy = TransformPolicy::from_config(&config);
        let lines = [line(4, 16, Some(7), 1.0)];
        let txs = transform_order(&order(16), &lines, &dims(), &policy, at(11)).unwrap();
        assert_eq!(txs[0].natural_key, "odoo-ph-16-4");
        assert_eq!(txs[0].source_system, "odoo-ph");
    }
}
