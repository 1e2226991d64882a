//! Property-based tests for the dirty-state guard.

use chrono::NaiveDate;
use freightbill_shared::types::{ClientId, CurrencyCode, InvoiceId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::draft::InvoiceDraft;
use super::types::InvoiceHeader;
use crate::ledger::{LineItemPatch, NewLineItem};
use crate::rating::RateCalculator;

fn header() -> InvoiceHeader {
    InvoiceHeader {
        client_id: Some(ClientId::new()),
        trip_id: None,
        display_currency: CurrencyCode::parse("EUR").unwrap(),
        issue_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        due_date: None,
        payment_terms: None,
        notes: None,
    }
}

fn arb_line() -> impl Strategy<Value = NewLineItem> {
    (1i64..100_000i64, 1i64..10_000i64).prop_map(|(grams, cents)| NewLineItem {
        description: "Parcel".to_string(),
        quantity: Decimal::ONE,
        actual_weight: Decimal::new(grams, 3),
        rate: Decimal::new(cents, 2),
        ..NewLineItem::default()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Bulk imports that commit never leave the draft dirty.
    #[test]
    fn prop_bulk_import_is_clean(batches in prop::collection::vec(prop::collection::vec(arb_line(), 1..5), 1..4)) {
        let mut draft = InvoiceDraft::new(InvoiceId::new(), header(), RateCalculator::default());
        for batch in batches {
            draft
                .commit_bulk(|ledger| {
                    for line in batch {
                        ledger.add_line(line)?;
                    }
                    Ok(())
                })
                .unwrap();
            prop_assert!(!draft.is_dirty());
        }
    }

    /// A rate change is dirty exactly when the value differs.
    #[test]
    fn prop_rate_change_dirty_iff_different(line in arb_line(), new_cents in 1i64..10_000i64) {
        let mut draft = InvoiceDraft::new(InvoiceId::new(), header(), RateCalculator::default());
        let original_rate = line.rate;
        let id = draft.commit_bulk(|ledger| ledger.add_line(line)).unwrap();
        let new_rate = Decimal::new(new_cents, 2);

        draft
            .update_line(id, LineItemPatch { rate: Some(new_rate), ..LineItemPatch::default() })
            .unwrap();

        prop_assert_eq!(draft.is_dirty(), new_rate != original_rate);
    }
}
