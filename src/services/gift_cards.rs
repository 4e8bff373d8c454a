use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::gift_card::normalize_tags;
use crate::models::{ExpiryInput, ExpiryPeriod, GiftCard};
use crate::store::{CasError, Store};

/// Redemption codes avoid ambiguous characters (0/O, 1/I).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_GROUPS: usize = 4;
const CODE_GROUP_LEN: usize = 4;

/// Balance mutations retry this many times on a lost compare-and-swap
/// before surfacing a conflict to the caller.
const MAX_CAS_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct NewGiftCard {
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub expiry: Option<ExpiryInput>,
    pub note: Option<String>,
}

/// Partial update: absent fields are left untouched; `expiry: never`
/// clears an existing expiry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGiftCard {
    pub tags: Option<Vec<String>>,
    pub expiry: Option<ExpiryInput>,
}

/// Gift card ledger: issuance, tag/expiry updates, balance debits and
/// compensating credits, and consent-gated deletion.
#[derive(Clone)]
pub struct GiftCardService {
    store: Arc<Store>,
    events: EventSender,
}

impl GiftCardService {
    pub fn new(store: Arc<Store>, events: EventSender) -> Self {
        Self { store, events }
    }

    /// Issues a card with a generated unique code. A period expiry is
    /// resolved to an absolute date against the creation date.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: NewGiftCard) -> Result<GiftCard, ServiceError> {
        if input.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "initial balance must be positive, got {}",
                input.amount
            )));
        }
        let currency = input.currency.trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ServiceError::ValidationError(format!(
                "currency must be a 3-letter ISO code, got {:?}",
                currency
            )));
        }

        let created_at = Utc::now();
        let expires_on = resolve_expiry(input.expiry, created_at.date_naive())?;

        let id = Uuid::new_v4();
        let code = self.claim_code(id);
        let card = GiftCard {
            id,
            code: code.clone(),
            initial_balance: input.amount,
            current_balance: input.amount,
            currency,
            tags: normalize_tags(input.tags),
            expires_on,
            note: input.note,
            is_active: true,
            created_at,
            updated_at: created_at,
        };
        self.store.gift_cards.insert(id, card.clone());

        info!(%id, %code, "gift card issued");
        self.events.send(Event::GiftCardIssued(id)).await;
        Ok(card)
    }

    /// Existence check by id: deleted or never-issued cards are `None`,
    /// not an error.
    pub fn find_by_id(&self, id: Uuid) -> Option<GiftCard> {
        self.store.gift_cards.get(&id)
    }

    pub fn find_by_code(&self, code: &str) -> Option<GiftCard> {
        let code = code.trim().to_uppercase();
        self.store
            .gift_card_codes
            .get(&code)
            .map(|entry| *entry.value())
            .and_then(|id| self.store.gift_cards.get(&id))
    }

    pub fn list(&self) -> Vec<GiftCard> {
        let mut cards = self.store.gift_cards.list();
        cards.sort_by(|a, b| a.code.cmp(&b.code));
        cards
    }

    pub fn list_by_tag(&self, tag: &str) -> Vec<GiftCard> {
        let mut cards: Vec<GiftCard> = self
            .store
            .gift_cards
            .list()
            .into_iter()
            .filter(|card| card.has_tag(tag))
            .collect();
        cards.sort_by(|a, b| a.code.cmp(&b.code));
        cards
    }

    /// Replaces the tag set and/or sets or clears the expiry.
    #[instrument(skip(self, update))]
    pub async fn update(&self, id: Uuid, update: UpdateGiftCard) -> Result<GiftCard, ServiceError> {
        let card = self
            .find_by_id(id)
            .ok_or_else(|| ServiceError::NotFound(format!("Gift card {} not found", id)))?;
        let expires_on = match update.expiry {
            Some(expiry) => resolve_expiry(Some(expiry), Utc::now().date_naive())?,
            None => card.expires_on,
        };

        let updated = self
            .store
            .gift_cards
            .update(&id, |card| {
                if let Some(tags) = update.tags {
                    card.tags = normalize_tags(tags);
                }
                card.expires_on = expires_on;
                card.updated_at = Utc::now();
            })
            .ok_or_else(|| ServiceError::NotFound(format!("Gift card {} not found", id)))?;

        self.events.send(Event::GiftCardUpdated(id)).await;
        Ok(updated)
    }

    /// Debits the balance. Goes through the authoritative store with a
    /// versioned compare-and-swap so concurrent redemptions can never
    /// jointly overdraw; returns the remaining balance.
    #[instrument(skip(self))]
    pub async fn redeem(
        &self,
        id: Uuid,
        amount: Decimal,
        currency: &str,
        now: DateTime<Utc>,
    ) -> Result<Decimal, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "redemption amount must be positive, got {}",
                amount
            )));
        }

        for _ in 0..MAX_CAS_ATTEMPTS {
            let (card, version) = self
                .store
                .gift_cards
                .get_versioned(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("Gift card {} not found", id)))?;

            if !card.is_active {
                return Err(ServiceError::InvalidOperation(format!(
                    "Gift card {} is deactivated",
                    id
                )));
            }
            if card.is_expired(now) {
                return Err(ServiceError::Expired(format!(
                    "Gift card {} expired on {}",
                    id,
                    card.expires_on.map(|d| d.to_string()).unwrap_or_default()
                )));
            }
            if !card.currency.eq_ignore_ascii_case(currency) {
                return Err(ServiceError::CurrencyMismatch {
                    expected: card.currency.clone(),
                    actual: currency.to_uppercase(),
                });
            }
            if amount > card.current_balance {
                return Err(ServiceError::InsufficientBalance {
                    requested: amount,
                    available: card.current_balance,
                });
            }

            let mut debited = card;
            debited.current_balance -= amount;
            debited.updated_at = now;
            let remaining = debited.current_balance;

            match self.store.gift_cards.compare_and_swap(&id, version, debited) {
                Ok(_) => {
                    self.events
                        .send(Event::GiftCardRedeemed {
                            gift_card_id: id,
                            amount,
                        })
                        .await;
                    return Ok(remaining);
                }
                Err(CasError::Conflict) => continue,
                Err(CasError::Missing) => {
                    return Err(ServiceError::NotFound(format!(
                        "Gift card {} not found",
                        id
                    )))
                }
            }
        }

        warn!(%id, "gift card redemption lost CAS race {} times", MAX_CAS_ATTEMPTS);
        Err(ServiceError::ConcurrencyConflict(format!(
            "gift card {} balance contention",
            id
        )))
    }

    /// Compensating credit for a debit whose enclosing checkout failed
    /// before order creation. Explicit, never a silent rollback; the
    /// balance is capped at the initial balance.
    #[instrument(skip(self))]
    pub async fn reverse(&self, id: Uuid, amount: Decimal) -> Result<Decimal, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "reversal amount must be positive, got {}",
                amount
            )));
        }

        for _ in 0..MAX_CAS_ATTEMPTS {
            let (card, version) = self
                .store
                .gift_cards
                .get_versioned(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("Gift card {} not found", id)))?;

            let mut credited = card;
            credited.current_balance =
                (credited.current_balance + amount).min(credited.initial_balance);
            credited.updated_at = Utc::now();
            let remaining = credited.current_balance;

            match self.store.gift_cards.compare_and_swap(&id, version, credited) {
                Ok(_) => {
                    self.events
                        .send(Event::GiftCardReversed {
                            gift_card_id: id,
                            amount,
                        })
                        .await;
                    return Ok(remaining);
                }
                Err(CasError::Conflict) => continue,
                Err(CasError::Missing) => {
                    return Err(ServiceError::NotFound(format!(
                        "Gift card {} not found",
                        id
                    )))
                }
            }
        }

        Err(ServiceError::ConcurrencyConflict(format!(
            "gift card {} balance contention",
            id
        )))
    }

    /// Deletes the card behind an explicit consent gate. After deletion,
    /// lookups by id return `None`.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid, consent_confirmed: bool) -> Result<(), ServiceError> {
        if !consent_confirmed {
            return Err(ServiceError::ConsentRequired(format!(
                "deleting gift card {} requires explicit confirmation",
                id
            )));
        }
        let card = self
            .store
            .gift_cards
            .remove(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Gift card {} not found", id)))?;
        self.store.gift_card_codes.remove(&card.code);

        info!(%id, "gift card deleted");
        self.events.send(Event::GiftCardDeleted(id)).await;
        Ok(())
    }

    /// Generates and claims a unique redemption code.
    fn claim_code(&self, id: Uuid) -> String {
        use dashmap::mapref::entry::Entry;
        loop {
            let code = generate_code();
            if let Entry::Vacant(vacant) = self.store.gift_card_codes.entry(code.clone()) {
                vacant.insert(id);
                return code;
            }
        }
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let mut code = String::with_capacity(CODE_GROUPS * (CODE_GROUP_LEN + 1) - 1);
    for group in 0..CODE_GROUPS {
        if group > 0 {
            code.push('-');
        }
        for _ in 0..CODE_GROUP_LEN {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            code.push(CODE_ALPHABET[idx] as char);
        }
    }
    code
}

fn resolve_expiry(
    expiry: Option<ExpiryInput>,
    today: NaiveDate,
) -> Result<Option<NaiveDate>, ServiceError> {
    match expiry {
        None | Some(ExpiryInput::Never) => Ok(None),
        Some(ExpiryInput::Date { date }) => Ok(Some(date)),
        Some(ExpiryInput::Period { amount, unit }) => {
            if amount == 0 {
                return Err(ServiceError::ValidationError(
                    "expiry period must be at least 1".to_string(),
                ));
            }
            ExpiryPeriod { amount, unit }
                .add_to(today)
                .map(Some)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "expiry period {} x {:?} overflows the calendar",
                        amount, unit
                    ))
                })
        }
    }
}
