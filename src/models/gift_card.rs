use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Calendar unit for relative gift-card expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

/// Relative expiry: `amount` x `unit` added to the creation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExpiryPeriod {
    pub amount: u32,
    pub unit: PeriodUnit,
}

impl ExpiryPeriod {
    /// Calendar-aware addition. Month and year steps clamp the day of
    /// month to the shorter month's last day instead of rolling over.
    pub fn add_to(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self.unit {
            PeriodUnit::Day => date.checked_add_days(chrono::Days::new(self.amount as u64)),
            PeriodUnit::Week => {
                date.checked_add_days(chrono::Days::new(self.amount as u64 * 7))
            }
            PeriodUnit::Month => date.checked_add_months(Months::new(self.amount)),
            PeriodUnit::Year => date.checked_add_months(Months::new(self.amount.checked_mul(12)?)),
        }
    }
}

/// Expiry as supplied on create/update: never, an absolute date, or a
/// period resolved against the creation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpiryInput {
    Never,
    Date { date: NaiveDate },
    Period { amount: u32, unit: PeriodUnit },
}

/// A stored-value instrument with a balance, optional expiry, and tags.
///
/// The currency is fixed at creation; the balance only decreases through
/// redemption (reversal credits are capped at the initial balance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftCard {
    pub id: Uuid,
    /// System-generated redemption code, unique and immutable.
    pub code: String,
    pub initial_balance: Decimal,
    pub current_balance: Decimal,
    pub currency: String,
    /// Free-text labels, case-insensitively unique within the card.
    pub tags: Vec<String>,
    pub expires_on: Option<NaiveDate>,
    pub note: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GiftCard {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_on
            .map_or(false, |expiry| now.date_naive() > expiry)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Dedupes tags case-insensitively, keeping first-seen casing and order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !seen.iter().any(|t| t.eq_ignore_ascii_case(trimmed)) {
            seen.push(trimmed.to_string());
        }
    }
    seen
}
