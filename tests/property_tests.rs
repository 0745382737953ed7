//! Property-based tests for the pure rules behind the workflow.
//!
//! Status aggregation, receiving classification, receipt totals and CNPJ
//! handling are checked across generated inputs.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use purchase_requests_api::{
    entities::item_receipt,
    models::{ItemStatus, ReceiptCondition, ReceivingStatus, RequestStatus},
    services::{
        catalog::{cnpj_digits, format_cnpj, is_valid_cnpj},
        receiving::ReceiptsSummary,
        request_status::compute_request_status,
    },
};
use uuid::Uuid;

fn item_status_strategy() -> impl Strategy<Value = ItemStatus> {
    prop_oneof![
        Just(ItemStatus::Pending),
        Just(ItemStatus::Approved),
        Just(ItemStatus::Rejected),
        Just(ItemStatus::Suspended),
    ]
}

fn reviewed_status_strategy() -> impl Strategy<Value = ItemStatus> {
    prop_oneof![
        Just(ItemStatus::Approved),
        Just(ItemStatus::Rejected),
        Just(ItemStatus::Suspended),
    ]
}

fn receipt(received: i32, rejected: i32, supplier: Option<Uuid>, age_minutes: i64) -> item_receipt::Model {
    let at = Utc::now() - Duration::minutes(age_minutes);
    item_receipt::Model {
        id: Uuid::new_v4(),
        request_item_id: Uuid::new_v4(),
        purchase_request_id: Uuid::new_v4(),
        received_by: Uuid::new_v4(),
        quantity_received: received,
        rejected_quantity: rejected,
        receipt_condition: ReceiptCondition::Good,
        invoice_number: "NF-1".to_string(),
        invoice_date: None,
        lot_number: None,
        expiration_date: None,
        supplier_id: supplier,
        quality_checked: false,
        quality_notes: None,
        notes: None,
        attachment_path: None,
        created_at: at,
        updated_at: at,
        deleted_at: None,
    }
}

// Aggregation never yields a status outside the derived set
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn aggregate_is_never_completed(items in prop::collection::vec(item_status_strategy(), 1..20)) {
        let status = compute_request_status(items.iter().copied());
        prop_assert!(status.is_some());
        prop_assert_ne!(status, Some(RequestStatus::Completed));
    }

    #[test]
    fn any_pending_item_keeps_request_pending(
        mut items in prop::collection::vec(item_status_strategy(), 0..20),
        position in any::<prop::sample::Index>(),
    ) {
        let at = position.index(items.len() + 1);
        items.insert(at, ItemStatus::Pending);
        prop_assert_eq!(compute_request_status(items), Some(RequestStatus::Pending));
    }

    #[test]
    fn reviewed_items_aggregate_by_unanimity(items in prop::collection::vec(reviewed_status_strategy(), 1..20)) {
        let expected = if items.iter().all(|s| *s == ItemStatus::Approved) {
            RequestStatus::Approved
        } else if items.iter().all(|s| *s == ItemStatus::Rejected) {
            RequestStatus::Rejected
        } else {
            RequestStatus::Partial
        };
        prop_assert_eq!(compute_request_status(items), Some(expected));
    }

    #[test]
    fn aggregation_ignores_item_order(mut items in prop::collection::vec(item_status_strategy(), 1..20)) {
        let forward = compute_request_status(items.iter().copied());
        items.reverse();
        prop_assert_eq!(forward, compute_request_status(items));
    }
}

// Receiving classification follows the ordered quantity
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn classification_matches_quantity_comparison(ordered in 1i64..10_000, received in -100i64..20_000) {
        let status = ReceivingStatus::classify(ordered, received);
        let expected = if received <= 0 {
            ReceivingStatus::Pending
        } else if received < ordered {
            ReceivingStatus::Partial
        } else if received == ordered {
            ReceivingStatus::Complete
        } else {
            ReceivingStatus::OverDelivered
        };
        prop_assert_eq!(status, expected);
    }

    #[test]
    fn receiving_more_never_moves_status_backwards(ordered in 1i64..1_000, received in 0i64..1_000, extra in 1i64..500) {
        fn rank(status: ReceivingStatus) -> u8 {
            match status {
                ReceivingStatus::Pending => 0,
                ReceivingStatus::Partial => 1,
                ReceivingStatus::Complete => 2,
                ReceivingStatus::OverDelivered => 3,
            }
        }
        let before = ReceivingStatus::classify(ordered, received);
        let after = ReceivingStatus::classify(ordered, received + extra);
        prop_assert!(rank(after) >= rank(before));
    }
}

// Receipt totals
proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn summary_totals_add_up(
        rows in prop::collection::vec((1i32..500, 0i32..500, any::<bool>(), 0i64..10_000), 0..15)
    ) {
        let supplier = Uuid::new_v4();
        let receipts: Vec<item_receipt::Model> = rows
            .iter()
            .map(|(received, rejected, with_supplier, age)| {
                let rejected = (*rejected).min(*received);
                receipt(*received, rejected, with_supplier.then_some(supplier), *age)
            })
            .collect();

        let summary = ReceiptsSummary::from_receipts(&receipts);

        prop_assert_eq!(summary.total_receipts, receipts.len());
        prop_assert_eq!(
            summary.total_quantity,
            receipts.iter().map(|r| i64::from(r.quantity_received)).sum::<i64>()
        );
        prop_assert_eq!(
            summary.total_rejected,
            receipts.iter().map(|r| i64::from(r.rejected_quantity)).sum::<i64>()
        );
        prop_assert!(summary.unique_suppliers <= 1);
        prop_assert!(summary.total_quantity >= summary.total_rejected);
        match (summary.first_receipt_date, summary.last_receipt_date) {
            (Some(first), Some(last)) => prop_assert!(first <= last),
            (None, None) => prop_assert!(receipts.is_empty()),
            _ => prop_assert!(false, "first and last dates must both be present or absent"),
        }
    }
}

// CNPJ check digits
proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn every_base_has_exactly_one_valid_completion(base in "[0-9]{12}") {
        let first = base.chars().next().unwrap();
        prop_assume!(!base.chars().all(|c| c == first));

        let valid: Vec<String> = (0..100)
            .map(|suffix| format!("{}{:02}", base, suffix))
            .filter(|candidate| is_valid_cnpj(candidate))
            .collect();
        prop_assert_eq!(valid.len(), 1);

        let formatted = format_cnpj(&valid[0]);
        prop_assert_eq!(formatted.len(), 18);
        prop_assert!(is_valid_cnpj(&formatted));
        prop_assert_eq!(cnpj_digits(&formatted), valid[0].clone());
    }

    #[test]
    fn wrong_lengths_are_never_valid(digits in "[0-9]{0,20}") {
        prop_assume!(digits.len() != 14);
        prop_assert!(!is_valid_cnpj(&digits));
    }
}
