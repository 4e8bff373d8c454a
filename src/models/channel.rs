use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Promotional instrument families a channel can enable or disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    PercentageVoucher,
    FixedVoucher,
    ShippingVoucher,
    GiftCard,
}

/// Per-channel enablement flags, one per instrument kind, each
/// independently togglable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InstrumentFlags {
    pub percentage_vouchers: bool,
    pub fixed_vouchers: bool,
    pub shipping_vouchers: bool,
    pub gift_cards: bool,
}

impl Default for InstrumentFlags {
    fn default() -> Self {
        Self {
            percentage_vouchers: true,
            fixed_vouchers: true,
            shipping_vouchers: true,
            gift_cards: true,
        }
    }
}

impl InstrumentFlags {
    pub fn is_enabled(&self, kind: InstrumentKind) -> bool {
        match kind {
            InstrumentKind::PercentageVoucher => self.percentage_vouchers,
            InstrumentKind::FixedVoucher => self.fixed_vouchers,
            InstrumentKind::ShippingVoucher => self.shipping_vouchers,
            InstrumentKind::GiftCard => self.gift_cards,
        }
    }

    pub fn set(&mut self, kind: InstrumentKind, enabled: bool) {
        match kind {
            InstrumentKind::PercentageVoucher => self.percentage_vouchers = enabled,
            InstrumentKind::FixedVoucher => self.fixed_vouchers = enabled,
            InstrumentKind::ShippingVoucher => self.shipping_vouchers = enabled,
            InstrumentKind::GiftCard => self.gift_cards = enabled,
        }
    }
}

/// A sales context (storefront/region) with its own currency and
/// instrument enablement. The slug is unique and immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    /// ISO 4217 currency code for every amount priced in this channel.
    pub currency: String,
    pub instruments: InstrumentFlags,
    pub created_at: DateTime<Utc>,
}
