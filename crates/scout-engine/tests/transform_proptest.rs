//! Property tests for the order transform: output is deterministic and
//! amounts reconcile per line.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use scout_engine::transform::{transform_order, Dimensions, TransformPolicy};
use scout_types::record::{Reference, SourceOrder, SourceOrderLine};

fn order(id: i64) -> SourceOrder {
    SourceOrder {
        id,
        name: Some(format!("Shop/{id:04}")),
        date_order: Some(Utc.with_ymd_and_hms(2025, 3, 1, 14, 0, 0).unwrap()),
        config: Some(Reference::new(1, "Register")),
        partner: None,
        amount_total: 0.0,
        amount_paid: 0.0,
        amount_tax: 0.0,
        state: "done".into(),
        payment_ids: Vec::new(),
        write_date: Some(Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap()),
        raw: serde_json::Value::Null,
    }
}

fn lines_strategy(order_id: i64) -> impl Strategy<Value = Vec<SourceOrderLine>> {
    prop::collection::vec(
        (
            prop::option::of(1_i64..50),
            -20.0_f64..200.0,
            0.0_f64..500.0,
            prop::option::of(0.0_f64..100.0),
        ),
        0..12,
    )
    .prop_map(move |specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (product, qty, price, discount))| SourceOrderLine {
                id: i64::try_from(i).unwrap() + 1,
                order_id,
                product: product.map(|p| Reference::new(p, format!("Brand{p} Item"))),
                qty,
                price_unit: price,
                price_subtotal: price * qty,
                price_subtotal_incl: price * qty * 1.12,
                discount,
                raw: serde_json::Value::Null,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn transform_is_deterministic(lines in lines_strategy(7)) {
        let order = order(7);
        let synced = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        let policy = TransformPolicy::default();
        let dims = Dimensions::default();

        let first = transform_order(&order, &lines, &dims, &policy, synced).unwrap();
        let second = transform_order(&order, &lines, &dims, &policy, synced).unwrap();
        prop_assert_eq!(&first, &second);

        let with_product = lines.iter().filter(|l| l.product.is_some()).count();
        prop_assert_eq!(first.len(), with_product);
        for tx in &first {
            prop_assert_eq!(tx.basket_size as usize, lines.len());
            prop_assert!(tx.natural_key.starts_with("odoo-7-"));
            prop_assert!((tx.gross_amount - tx.net_amount - tx.discount_amount).abs() < 1e-6);
        }
    }
}
