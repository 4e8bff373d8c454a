//! Property-based tests for the pricing and normalization invariants.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

use promotions_api::events::EventSender;
use promotions_api::models::gift_card::normalize_tags;
use promotions_api::models::voucher::normalize_code;
use promotions_api::models::{
    Channel, Checkout, CheckoutStatus, DiscountKind, ExpiryPeriod, InstrumentFlags, LineItem,
    PeriodUnit, ShippingSelection, Voucher,
};
use promotions_api::services::channels::ChannelService;
use promotions_api::services::vouchers::{VoucherPricing, VoucherService};
use promotions_api::store::Store;

/// Applies a voucher of the given kind to a single-line checkout without
/// going through the async creation paths.
fn price_with_voucher(kind: DiscountKind, subtotal: Decimal, shipping: Decimal) -> VoucherPricing {
    let store = Arc::new(Store::new());
    let (tx, _rx) = mpsc::channel(16);
    let events = EventSender::new(tx);
    let channels = Arc::new(ChannelService::new(store.clone(), events.clone()));
    let vouchers = VoucherService::new(store.clone(), channels, events);

    let now = Utc::now();
    let channel_id = Uuid::new_v4();
    store.channels.insert(
        channel_id,
        Channel {
            id: channel_id,
            name: "Test".into(),
            slug: "test".into(),
            currency: "USD".into(),
            instruments: InstrumentFlags::default(),
            created_at: now,
        },
    );
    store.vouchers.insert(
        "PROP".into(),
        Voucher {
            code: "PROP".into(),
            kind,
            channels: HashSet::from([channel_id]),
            starts_at: now - Duration::hours(1),
            ends_at: None,
            usage_limit: None,
            usage_count: 0,
            created_at: now,
        },
    );
    let checkout = Checkout {
        id: Uuid::new_v4(),
        channel_id,
        currency: "USD".into(),
        items: vec![LineItem {
            variant_id: Uuid::new_v4(),
            quantity: 1,
            unit_price: subtotal,
        }],
        shipping: ShippingSelection {
            name: "Standard".into(),
            price: shipping,
        },
        voucher_code: None,
        gift_card_codes: vec![],
        status: CheckoutStatus::Active,
        created_at: now,
        updated_at: now,
    };

    vouchers
        .apply_voucher(&checkout, "PROP", now)
        .expect("valid voucher applies")
}

fn money() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn percentage_discount_never_exceeds_the_subtotal(
        subtotal in money(),
        shipping in money(),
        pct in 1u32..=100,
    ) {
        let pricing = price_with_voucher(
            DiscountKind::Percentage(Decimal::from(pct)),
            subtotal,
            shipping,
        );
        prop_assert!(pricing.merchandise_discount <= subtotal);
        prop_assert_eq!(pricing.shipping_discount, Decimal::ZERO);
        prop_assert!(pricing.adjusted_total >= shipping);
        prop_assert_eq!(
            pricing.adjusted_total,
            subtotal - pricing.merchandise_discount + shipping
        );
    }

    #[test]
    fn fixed_discount_clamps_to_the_subtotal(
        subtotal in money(),
        shipping in money(),
        value_cents in 1i64..2_000_000,
    ) {
        let value = Decimal::new(value_cents, 2);
        let pricing = price_with_voucher(DiscountKind::Fixed(value), subtotal, shipping);
        prop_assert_eq!(pricing.merchandise_discount, value.min(subtotal));
        prop_assert!(pricing.adjusted_total >= shipping);
    }

    #[test]
    fn shipping_discount_leaves_merchandise_untouched(
        subtotal in money(),
        shipping in money(),
    ) {
        let pricing = price_with_voucher(DiscountKind::Shipping, subtotal, shipping);
        prop_assert_eq!(pricing.merchandise_discount, Decimal::ZERO);
        prop_assert_eq!(pricing.shipping_discount, shipping);
        prop_assert_eq!(pricing.adjusted_total, subtotal);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn code_normalization_is_idempotent(code in "[ ]{0,3}[a-zA-Z0-9-]{1,24}[ ]{0,3}") {
        let once = normalize_code(&code);
        prop_assert_eq!(normalize_code(&once), once.clone());
        prop_assert_eq!(once.trim(), once.as_str());
        prop_assert!(!once.chars().any(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn tag_normalization_removes_case_insensitive_duplicates(
        tags in proptest::collection::vec("[a-zA-Z]{1,8}", 0..10),
    ) {
        let normalized = normalize_tags(tags.clone());
        let mut seen = HashSet::new();
        for tag in &normalized {
            prop_assert!(seen.insert(tag.to_lowercase()), "duplicate tag {}", tag);
        }
        // Every input tag is still represented.
        for tag in &tags {
            prop_assert!(seen.contains(&tag.to_lowercase()));
        }
    }

    #[test]
    fn period_expiry_never_moves_backwards(
        year in 2000i32..2100,
        month in 1u32..=12,
        day in 1u32..=28,
        amount in 0u32..120,
        unit_pick in 0usize..4,
    ) {
        let unit = [PeriodUnit::Day, PeriodUnit::Week, PeriodUnit::Month, PeriodUnit::Year][unit_pick];
        let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
        let period = ExpiryPeriod { amount, unit };
        let resolved = period.add_to(date).expect("in-range addition");
        prop_assert!(resolved >= date);
        if amount == 0 {
            prop_assert_eq!(resolved, date);
        }
    }

    #[test]
    fn month_addition_clamps_the_day_of_month(
        year in 2000i32..2100,
        month in 1u32..=12,
        day in 29u32..=31,
        amount in 1u32..24,
    ) {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            use chrono::Datelike;
            let resolved = ExpiryPeriod { amount, unit: PeriodUnit::Month }
                .add_to(date)
                .expect("in-range addition");
            prop_assert!(resolved.day() <= day);
            prop_assert!(resolved > date);
        }
    }
}
