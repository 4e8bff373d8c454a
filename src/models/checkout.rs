use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A line in the checkout: product variant, quantity, unit price.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub variant_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl LineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Selected shipping method and its price.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShippingSelection {
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    Active,
    Completed,
    Abandoned,
}

/// An in-progress order before payment capture and completion.
///
/// Carries at most one applied voucher and zero-or-more gift cards;
/// totals are computed on demand by the pricing aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkout {
    pub id: Uuid,
    pub channel_id: Uuid,
    /// Inherited from the channel at creation.
    pub currency: String,
    pub items: Vec<LineItem>,
    pub shipping: ShippingSelection,
    pub voucher_code: Option<String>,
    pub gift_card_codes: Vec<String>,
    pub status: CheckoutStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkout {
    /// Merchandise subtotal over the line items; shipping excluded.
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(LineItem::line_total).sum()
    }
}
