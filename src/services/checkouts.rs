use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::errors::{Rejection, RejectionReason, ServiceError};
use crate::events::{Event, EventSender};
use crate::models::{
    Checkout, CheckoutStatus, GiftCard, InstrumentKind, LineItem, ShippingSelection,
};
use crate::services::channels::ChannelService;
use crate::services::gift_cards::GiftCardService;
use crate::services::vouchers::{VoucherPricing, VoucherService};
use crate::store::Store;

/// How long a pricing reservation stays consumable.
const RESERVATION_TTL_MINUTES: i64 = 10;

/// One gift-card debit planned by pricing and executed by completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftCardDebit {
    pub gift_card_id: Uuid,
    pub code: String,
    pub amount: Decimal,
}

/// Full price breakdown in fixed application order: merchandise subtotal,
/// shipping, voucher discount, then gift-card debits against the
/// post-voucher gross.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub merchandise_discount: Decimal,
    pub shipping_discount: Decimal,
    pub gift_card_debits: Vec<GiftCardDebit>,
    /// Gross total after all adjustments; never negative.
    pub total: Decimal,
    pub currency: String,
}

/// Outcome of the read-only validate-and-price phase. The token is
/// consumed exactly once by [`CheckoutService::complete`].
#[derive(Debug, Clone, Serialize)]
pub struct PricingReservation {
    pub token: Uuid,
    pub checkout_id: Uuid,
    pub breakdown: PricingBreakdown,
    pub expires_at: DateTime<Utc>,
}

/// The finalized checkout record handed to the order collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizedCheckout {
    pub checkout_id: Uuid,
    pub channel_id: Uuid,
    pub breakdown: PricingBreakdown,
    pub voucher_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedOrder {
    pub order_id: String,
    pub checkout_id: Uuid,
    pub total: Decimal,
    pub currency: String,
}

/// Outbound seam to the order-completion workflow. The engine does not
/// know how orders are persisted or fulfilled.
#[async_trait]
pub trait OrderCollaborator: Send + Sync {
    async fn create_order(&self, checkout: &FinalizedCheckout)
        -> Result<CompletedOrder, ServiceError>;
}

/// Default collaborator: assigns an order number locally.
pub struct LocalOrderCollaborator;

#[async_trait]
impl OrderCollaborator for LocalOrderCollaborator {
    async fn create_order(
        &self,
        checkout: &FinalizedCheckout,
    ) -> Result<CompletedOrder, ServiceError> {
        let order_id = format!(
            "ORD-{}",
            Uuid::new_v4().to_string()[..8].to_uppercase()
        );
        Ok(CompletedOrder {
            order_id,
            checkout_id: checkout.checkout_id,
            total: checkout.breakdown.total,
            currency: checkout.breakdown.currency.clone(),
        })
    }
}

/// Checkout pricing aggregator: composes the channel registry, voucher
/// engine, and gift-card ledger into one authoritative total, and drives
/// the two-phase price/complete protocol.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<Store>,
    channels: Arc<ChannelService>,
    vouchers: Arc<VoucherService>,
    gift_cards: Arc<GiftCardService>,
    events: EventSender,
    collaborator: Arc<dyn OrderCollaborator>,
    reservations: Arc<DashMap<Uuid, PricingReservation>>,
}

impl CheckoutService {
    pub fn new(
        store: Arc<Store>,
        channels: Arc<ChannelService>,
        vouchers: Arc<VoucherService>,
        gift_cards: Arc<GiftCardService>,
        events: EventSender,
        collaborator: Arc<dyn OrderCollaborator>,
    ) -> Self {
        Self {
            store,
            channels,
            vouchers,
            gift_cards,
            events,
            collaborator,
            reservations: Arc::new(DashMap::new()),
        }
    }

    #[instrument(skip(self, items, shipping))]
    pub async fn create(
        &self,
        channel_id: Uuid,
        items: Vec<LineItem>,
        shipping: ShippingSelection,
    ) -> Result<Checkout, ServiceError> {
        let channel = self.channels.get(channel_id)?;
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "checkout must contain at least one line item".to_string(),
            ));
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(ServiceError::ValidationError(
                    "line item quantity must be positive".to_string(),
                ));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "line item price must not be negative".to_string(),
                ));
            }
        }
        if shipping.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "shipping price must not be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let checkout = Checkout {
            id: Uuid::new_v4(),
            channel_id,
            currency: channel.currency,
            items,
            shipping,
            voucher_code: None,
            gift_card_codes: Vec::new(),
            status: CheckoutStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.store.checkouts.insert(checkout.id, checkout.clone());
        self.events.send(Event::CheckoutCreated(checkout.id)).await;
        Ok(checkout)
    }

    pub fn get(&self, id: Uuid) -> Result<Checkout, ServiceError> {
        self.store
            .checkouts
            .get(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Checkout {} not found", id)))
    }

    /// Validates and attaches a voucher. A different code replaces the
    /// prior one; re-applying the same code is a no-op. A rejection leaves
    /// the checkout in its pre-application state.
    #[instrument(skip(self))]
    pub async fn apply_promo_code(
        &self,
        checkout_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VoucherPricing, ServiceError> {
        let checkout = self.active_checkout(checkout_id)?;

        // Validation first; the checkout mutates only on success.
        let pricing = self.vouchers.apply_voucher(&checkout, code, now)?;

        if checkout.voucher_code.as_deref() != Some(pricing.code.as_str()) {
            self.store.checkouts.update(&checkout_id, |checkout| {
                checkout.voucher_code = Some(pricing.code.clone());
                checkout.updated_at = now;
            });
            self.invalidate_reservations(checkout_id);
        }

        self.events
            .send(Event::VoucherApplied {
                checkout_id,
                code: pricing.code.clone(),
            })
            .await;
        Ok(pricing)
    }

    #[instrument(skip(self))]
    pub async fn remove_promo_code(&self, checkout_id: Uuid) -> Result<Checkout, ServiceError> {
        self.active_checkout(checkout_id)?;
        let updated = self
            .store
            .checkouts
            .update(&checkout_id, |checkout| {
                checkout.voucher_code = None;
                checkout.updated_at = Utc::now();
            })
            .ok_or_else(|| ServiceError::NotFound(format!("Checkout {} not found", checkout_id)))?;
        self.invalidate_reservations(checkout_id);
        Ok(updated)
    }

    /// Attaches a gift card for redemption at completion. The card must
    /// exist, be redeemable in the checkout's channel, and match its
    /// currency.
    #[instrument(skip(self))]
    pub async fn add_gift_card(
        &self,
        checkout_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Checkout, ServiceError> {
        let checkout = self.active_checkout(checkout_id)?;
        let card = self.validate_gift_card(&checkout, code, now)?;

        if checkout.gift_card_codes.iter().any(|c| *c == card.code) {
            return Ok(checkout);
        }
        let updated = self
            .store
            .checkouts
            .update(&checkout_id, |checkout| {
                checkout.gift_card_codes.push(card.code.clone());
                checkout.updated_at = now;
            })
            .ok_or_else(|| ServiceError::NotFound(format!("Checkout {} not found", checkout_id)))?;
        self.invalidate_reservations(checkout_id);
        Ok(updated)
    }

    /// Phase one: read-only validate-and-price. Returns a reservation
    /// token with a short expiry; nothing is debited yet.
    #[instrument(skip(self))]
    pub async fn price(
        &self,
        checkout_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PricingReservation, ServiceError> {
        let checkout = self.active_checkout(checkout_id)?;
        let breakdown = self.compute_breakdown(&checkout, now)?;

        let reservation = PricingReservation {
            token: Uuid::new_v4(),
            checkout_id,
            breakdown,
            expires_at: now + Duration::minutes(RESERVATION_TTL_MINUTES),
        };
        self.reservations
            .insert(reservation.token, reservation.clone());
        Ok(reservation)
    }

    /// Phase two: consumes the reservation, debits gift cards through the
    /// ledger's CAS path, commits voucher usage, and hands the finalized
    /// checkout to the order collaborator. Debits already taken are
    /// compensated if a later step fails.
    #[instrument(skip(self))]
    pub async fn complete(
        &self,
        checkout_id: Uuid,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CompletedOrder, ServiceError> {
        let (_, reservation) = self
            .reservations
            .remove_if(&token, |_, reservation| {
                reservation.checkout_id == checkout_id
            })
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Pricing reservation {} not found for checkout {}",
                    token, checkout_id
                ))
            })?;
        if now > reservation.expires_at {
            return Err(ServiceError::InvalidOperation(
                "pricing reservation has expired; re-price the checkout".to_string(),
            ));
        }

        let checkout = self.active_checkout(reservation.checkout_id)?;
        let breakdown = &reservation.breakdown;

        // Debit in the planned order; roll back already-taken debits on
        // any failure.
        let mut taken: Vec<&GiftCardDebit> = Vec::with_capacity(breakdown.gift_card_debits.len());
        for debit in &breakdown.gift_card_debits {
            match self
                .gift_cards
                .redeem(debit.gift_card_id, debit.amount, &breakdown.currency, now)
                .await
            {
                Ok(_) => taken.push(debit),
                Err(err) => {
                    self.compensate(&taken).await;
                    return Err(err);
                }
            }
        }

        if let Some(code) = &checkout.voucher_code {
            if let Err(err) = self.vouchers.commit_usage(code) {
                self.compensate(&taken).await;
                return Err(err);
            }
        }

        let finalized = FinalizedCheckout {
            checkout_id: checkout.id,
            channel_id: checkout.channel_id,
            breakdown: breakdown.clone(),
            voucher_code: checkout.voucher_code.clone(),
        };
        let order = match self.collaborator.create_order(&finalized).await {
            Ok(order) => order,
            Err(err) => {
                error!(checkout_id = %checkout.id, "order creation failed: {}", err);
                self.compensate(&taken).await;
                return Err(err);
            }
        };

        self.store.checkouts.update(&checkout.id, |checkout| {
            checkout.status = CheckoutStatus::Completed;
            checkout.updated_at = now;
        });

        info!(checkout_id = %checkout.id, order_id = %order.order_id, "checkout completed");
        self.events
            .send(Event::CheckoutCompleted {
                checkout_id: checkout.id,
                order_id: order.order_id.clone(),
            })
            .await;
        Ok(order)
    }

    /// Fixed application order: subtotal, shipping, voucher, gift cards.
    /// Gift cards are applied largest-balance-first with a lexicographic
    /// code tie-break; excess capacity is left on the card.
    fn compute_breakdown(
        &self,
        checkout: &Checkout,
        now: DateTime<Utc>,
    ) -> Result<PricingBreakdown, ServiceError> {
        let subtotal = checkout.subtotal();
        let shipping = checkout.shipping.price;

        let (merchandise_discount, shipping_discount) = match &checkout.voucher_code {
            Some(code) => {
                let pricing = self.vouchers.apply_voucher(checkout, code, now)?;
                (pricing.merchandise_discount, pricing.shipping_discount)
            }
            None => (Decimal::ZERO, Decimal::ZERO),
        };

        let gross = subtotal - merchandise_discount + shipping - shipping_discount;

        let mut cards = Vec::with_capacity(checkout.gift_card_codes.len());
        for code in &checkout.gift_card_codes {
            cards.push(self.validate_gift_card(checkout, code, now)?);
        }
        cards.sort_by(|a, b| {
            b.current_balance
                .cmp(&a.current_balance)
                .then_with(|| a.code.cmp(&b.code))
        });

        let mut remaining = gross;
        let mut debits = Vec::new();
        for card in cards {
            if remaining <= Decimal::ZERO {
                break;
            }
            let amount = card.current_balance.min(remaining);
            if amount > Decimal::ZERO {
                remaining -= amount;
                debits.push(GiftCardDebit {
                    gift_card_id: card.id,
                    code: card.code,
                    amount,
                });
            }
        }

        Ok(PricingBreakdown {
            subtotal,
            shipping,
            merchandise_discount,
            shipping_discount,
            gift_card_debits: debits,
            total: remaining,
            currency: checkout.currency.clone(),
        })
    }

    fn validate_gift_card(
        &self,
        checkout: &Checkout,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<GiftCard, ServiceError> {
        let card = self.gift_cards.find_by_code(code).ok_or_else(|| {
            ServiceError::Rejected(Rejection::gift_card_code(RejectionReason::NotFound))
        })?;

        let enabled = self
            .channels
            .is_instrument_enabled(checkout.channel_id, InstrumentKind::GiftCard)?;
        if !enabled || !card.is_active {
            return Err(ServiceError::Rejected(Rejection::gift_card_code(
                RejectionReason::NotAvailableInChannel,
            )));
        }
        if card.is_expired(now) {
            return Err(ServiceError::Rejected(Rejection::gift_card_code(
                RejectionReason::Expired,
            )));
        }
        if !card.currency.eq_ignore_ascii_case(&checkout.currency) {
            return Err(ServiceError::CurrencyMismatch {
                expected: checkout.currency.clone(),
                actual: card.currency.clone(),
            });
        }
        Ok(card)
    }

    async fn compensate(&self, taken: &[&GiftCardDebit]) {
        for debit in taken {
            if let Err(err) = self
                .gift_cards
                .reverse(debit.gift_card_id, debit.amount)
                .await
            {
                // The reversal itself is best-effort; the ledger keeps the
                // explicit record either way.
                error!(
                    gift_card_id = %debit.gift_card_id,
                    "failed to compensate gift card debit: {}", err
                );
            }
        }
    }

    fn active_checkout(&self, checkout_id: Uuid) -> Result<Checkout, ServiceError> {
        let checkout = self.get(checkout_id)?;
        if checkout.status != CheckoutStatus::Active {
            return Err(ServiceError::InvalidOperation(format!(
                "Checkout {} is not active",
                checkout_id
            )));
        }
        Ok(checkout)
    }

    /// Pricing reservations are snapshots; any checkout mutation makes
    /// them stale.
    fn invalidate_reservations(&self, checkout_id: Uuid) {
        self.reservations
            .retain(|_, reservation| reservation.checkout_id != checkout_id);
    }

    /// Marks an abandoned checkout; no debits have happened, so there is
    /// nothing to compensate.
    pub async fn abandon(&self, checkout_id: Uuid) -> Result<Checkout, ServiceError> {
        self.active_checkout(checkout_id)?;
        let updated = self
            .store
            .checkouts
            .update(&checkout_id, |checkout| {
                checkout.status = CheckoutStatus::Abandoned;
                checkout.updated_at = Utc::now();
            })
            .ok_or_else(|| ServiceError::NotFound(format!("Checkout {} not found", checkout_id)))?;
        self.invalidate_reservations(checkout_id);
        Ok(updated)
    }
}
