use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::channel::InstrumentKind;

/// Discount kind with its value. Exactly one kind per voucher; the value
/// is required for percentage/fixed and absent for shipping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DiscountKind {
    /// Ratio in (0, 100], applied to the merchandise subtotal only.
    Percentage(Decimal),
    /// Positive amount, clamped to the merchandise subtotal when applied.
    Fixed(Decimal),
    /// Zeroes the shipping price; merchandise subtotal untouched.
    Shipping,
}

impl DiscountKind {
    pub fn percentage(value: Decimal) -> Result<Self, ServiceError> {
        let kind = Self::Percentage(value);
        kind.validate()?;
        Ok(kind)
    }

    pub fn fixed(value: Decimal) -> Result<Self, ServiceError> {
        let kind = Self::Fixed(value);
        kind.validate()?;
        Ok(kind)
    }

    /// Re-checks the kind/value invariant for values that arrived through
    /// deserialization rather than a constructor.
    pub fn validate(&self) -> Result<(), ServiceError> {
        match self {
            Self::Percentage(value) => {
                if *value <= Decimal::ZERO || *value > Decimal::from(100) {
                    return Err(ServiceError::ValidationError(format!(
                        "percentage discount must be in (0, 100], got {}",
                        value
                    )));
                }
            }
            Self::Fixed(value) => {
                if *value <= Decimal::ZERO {
                    return Err(ServiceError::ValidationError(format!(
                        "fixed discount must be positive, got {}",
                        value
                    )));
                }
            }
            Self::Shipping => {}
        }
        Ok(())
    }

    pub fn instrument_kind(&self) -> InstrumentKind {
        match self {
            Self::Percentage(_) => InstrumentKind::PercentageVoucher,
            Self::Fixed(_) => InstrumentKind::FixedVoucher,
            Self::Shipping => InstrumentKind::ShippingVoucher,
        }
    }
}

/// A redeemable code granting a discount, scoped to channels and an
/// optional validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    /// Unique, case-normalized via [`normalize_code`].
    pub code: String,
    pub kind: DiscountKind,
    /// Channels this voucher may be applied in.
    pub channels: HashSet<Uuid>,
    pub starts_at: DateTime<Utc>,
    /// Absent means the voucher never expires by date.
    pub ends_at: Option<DateTime<Utc>>,
    /// Usage accounting is committed only on checkout completion.
    pub usage_limit: Option<u32>,
    pub usage_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Voucher {
    pub fn usage_exhausted(&self) -> bool {
        self.usage_limit
            .map_or(false, |limit| self.usage_count >= limit)
    }
}

/// Voucher codes compare case-insensitively and ignore surrounding
/// whitespace.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn percentage_value_must_be_a_ratio() {
        assert!(DiscountKind::percentage(dec!(50)).is_ok());
        assert!(DiscountKind::percentage(dec!(100)).is_ok());
        assert!(DiscountKind::percentage(dec!(0)).is_err());
        assert!(DiscountKind::percentage(dec!(100.01)).is_err());
    }

    #[test]
    fn fixed_value_must_be_positive() {
        assert!(DiscountKind::fixed(dec!(0.01)).is_ok());
        assert!(DiscountKind::fixed(dec!(0)).is_err());
        assert!(DiscountKind::fixed(dec!(-5)).is_err());
    }

    #[test]
    fn codes_normalize_case_and_whitespace() {
        assert_eq!(normalize_code("  cyVou-123 "), "CYVOU-123");
    }

    #[test]
    fn usage_exhaustion_only_applies_with_a_limit() {
        let mut voucher = Voucher {
            code: "TEST".into(),
            kind: DiscountKind::Shipping,
            channels: HashSet::new(),
            starts_at: Utc::now(),
            ends_at: None,
            usage_limit: None,
            usage_count: 1_000,
            created_at: Utc::now(),
        };
        assert!(!voucher.usage_exhausted());
        voucher.usage_limit = Some(1_000);
        assert!(voucher.usage_exhausted());
    }
}
