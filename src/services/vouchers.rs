use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::errors::{Rejection, RejectionReason, ServiceError};
use crate::events::{Event, EventSender};
use crate::models::voucher::normalize_code;
use crate::models::{Checkout, DiscountKind, Voucher};
use crate::services::channels::ChannelService;
use crate::store::{CasError, Store};

/// Usage commits retry this many times on a lost compare-and-swap
/// before surfacing a conflict to the caller.
const MAX_CAS_ATTEMPTS: u32 = 3;

/// Input for voucher creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVoucher {
    pub code: String,
    pub kind: DiscountKind,
    /// Channels the voucher is usable in.
    pub channel_ids: Vec<Uuid>,
    /// Defaults to "now" when absent.
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<u32>,
}

/// Priced outcome of a successful voucher validation. Read-only: nothing
/// is mutated until checkout completion.
#[derive(Debug, Clone, Serialize)]
pub struct VoucherPricing {
    pub code: String,
    pub merchandise_discount: Decimal,
    pub shipping_discount: Decimal,
    pub adjusted_total: Decimal,
}

/// Voucher engine: validates a code against a channel and checkout and
/// computes the price adjustment.
#[derive(Clone)]
pub struct VoucherService {
    store: Arc<Store>,
    channels: Arc<ChannelService>,
    events: EventSender,
}

impl VoucherService {
    pub fn new(store: Arc<Store>, channels: Arc<ChannelService>, events: EventSender) -> Self {
        Self {
            store,
            channels,
            events,
        }
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(&self, input: NewVoucher) -> Result<Voucher, ServiceError> {
        let code = normalize_code(&input.code);
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "voucher code must not be empty".to_string(),
            ));
        }
        input.kind.validate()?;

        let starts_at = input.starts_at.unwrap_or_else(Utc::now);
        if let Some(ends_at) = input.ends_at {
            if ends_at <= starts_at {
                return Err(ServiceError::ValidationError(
                    "voucher end must be after its start".to_string(),
                ));
            }
        }

        let mut channels = HashSet::with_capacity(input.channel_ids.len());
        for channel_id in input.channel_ids {
            // Existence check doubles as the NotFound for bad channel refs.
            self.channels.get(channel_id)?;
            channels.insert(channel_id);
        }

        let voucher = Voucher {
            code: code.clone(),
            kind: input.kind,
            channels,
            starts_at,
            ends_at: input.ends_at,
            usage_limit: input.usage_limit,
            usage_count: 0,
            created_at: Utc::now(),
        };

        if !self.store.vouchers.insert(code.clone(), voucher.clone()) {
            return Err(ServiceError::Conflict(format!(
                "Voucher {} already exists",
                code
            )));
        }

        info!(%code, "voucher created");
        self.events.send(Event::VoucherCreated { code }).await;
        Ok(voucher)
    }

    pub fn get(&self, code: &str) -> Result<Voucher, ServiceError> {
        let code = normalize_code(code);
        self.store
            .vouchers
            .get(&code)
            .ok_or_else(|| ServiceError::NotFound(format!("Voucher {} not found", code)))
    }

    /// Deletion is terminal and immediate.
    #[instrument(skip(self))]
    pub async fn delete(&self, code: &str) -> Result<(), ServiceError> {
        let code = normalize_code(code);
        self.store
            .vouchers
            .remove(&code)
            .ok_or_else(|| ServiceError::NotFound(format!("Voucher {} not found", code)))?;
        self.events.send(Event::VoucherDeleted { code }).await;
        Ok(())
    }

    /// Replaces the voucher's channel enablement set.
    pub async fn set_channels(
        &self,
        code: &str,
        channel_ids: Vec<Uuid>,
    ) -> Result<Voucher, ServiceError> {
        let code = normalize_code(code);
        let mut channels = HashSet::with_capacity(channel_ids.len());
        for channel_id in channel_ids {
            self.channels.get(channel_id)?;
            channels.insert(channel_id);
        }
        self.store
            .vouchers
            .update(&code, |voucher| voucher.channels = channels)
            .ok_or_else(|| ServiceError::NotFound(format!("Voucher {} not found", code)))
    }

    /// Validates the code against the checkout's channel and prices the
    /// discount. Read-only and idempotent; any failure comes back as a
    /// structured rejection on the `promoCode` field.
    #[instrument(skip(self, checkout), fields(checkout_id = %checkout.id))]
    pub fn apply_voucher(
        &self,
        checkout: &Checkout,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VoucherPricing, ServiceError> {
        let code = normalize_code(code);
        let voucher = match self.store.vouchers.get(&code) {
            Some(voucher) => voucher,
            None => {
                debug!(%code, "voucher not found");
                return Err(reject(RejectionReason::NotFound));
            }
        };

        self.check_available(&voucher, checkout.channel_id, now)?;
        Ok(self.price(&voucher, checkout))
    }

    /// Steps 2-3 of voucher application: channel enablement, then the
    /// validity window, then usage accounting.
    fn check_available(
        &self,
        voucher: &Voucher,
        channel_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let kind_enabled = self
            .channels
            .is_instrument_enabled(channel_id, voucher.kind.instrument_kind())?;
        if !kind_enabled || !voucher.channels.contains(&channel_id) {
            // Exists but not usable here; distinct from NotFound internally,
            // same "promoCode" field externally.
            debug!(code = %voucher.code, %channel_id, "voucher not available in channel");
            return Err(reject(RejectionReason::NotAvailableInChannel));
        }
        if now < voucher.starts_at {
            return Err(reject(RejectionReason::NotStarted));
        }
        if let Some(ends_at) = voucher.ends_at {
            if now > ends_at {
                return Err(reject(RejectionReason::Expired));
            }
        }
        if voucher.usage_exhausted() {
            return Err(reject(RejectionReason::UsageLimitReached));
        }
        Ok(())
    }

    /// Discount computation per kind. Percentage and fixed touch only the
    /// merchandise subtotal; shipping vouchers only zero the shipping.
    fn price(&self, voucher: &Voucher, checkout: &Checkout) -> VoucherPricing {
        let subtotal = checkout.subtotal();
        let shipping = checkout.shipping.price;

        let (merchandise_discount, shipping_discount) = match &voucher.kind {
            DiscountKind::Percentage(value) => {
                (subtotal * *value / Decimal::from(100), Decimal::ZERO)
            }
            DiscountKind::Fixed(value) => ((*value).min(subtotal), Decimal::ZERO),
            DiscountKind::Shipping => (Decimal::ZERO, shipping),
        };

        VoucherPricing {
            code: voucher.code.clone(),
            merchandise_discount,
            shipping_discount,
            adjusted_total: subtotal - merchandise_discount + shipping - shipping_discount,
        }
    }

    /// Commits one use of the voucher. Called by checkout completion only;
    /// vouchers without a usage limit still count usage for reporting.
    ///
    /// The limit is re-checked under compare-and-swap: two reservations
    /// priced against the same remaining budget cannot both commit.
    pub fn commit_usage(&self, code: &str) -> Result<(), ServiceError> {
        let code = normalize_code(code);
        for _ in 0..MAX_CAS_ATTEMPTS {
            let (voucher, version) = self
                .store
                .vouchers
                .get_versioned(&code)
                .ok_or_else(|| ServiceError::NotFound(format!("Voucher {} not found", code)))?;
            if voucher.usage_exhausted() {
                return Err(reject(RejectionReason::UsageLimitReached));
            }

            let mut committed = voucher;
            committed.usage_count += 1;
            match self.store.vouchers.compare_and_swap(&code, version, committed) {
                Ok(_) => return Ok(()),
                Err(CasError::Conflict) => continue,
                Err(CasError::Missing) => {
                    return Err(ServiceError::NotFound(format!(
                        "Voucher {} not found",
                        code
                    )))
                }
            }
        }

        Err(ServiceError::ConcurrencyConflict(format!(
            "voucher {} usage contention",
            code
        )))
    }
}

fn reject(reason: RejectionReason) -> ServiceError {
    ServiceError::Rejected(Rejection::promo_code(reason))
}
