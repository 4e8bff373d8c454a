use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Channel, InstrumentFlags, InstrumentKind};
use crate::store::Store;

/// Channel registry: owns the set of sales channels and which instrument
/// kinds are enabled in each.
#[derive(Clone)]
pub struct ChannelService {
    store: Arc<Store>,
    events: EventSender,
}

impl ChannelService {
    pub fn new(store: Arc<Store>, events: EventSender) -> Self {
        Self { store, events }
    }

    /// Creates a channel with a generated unique slug. All instrument
    /// kinds start enabled.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str, currency: &str) -> Result<Channel, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "channel name must not be empty".to_string(),
            ));
        }
        let currency = currency.trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ServiceError::ValidationError(format!(
                "currency must be a 3-letter ISO code, got {:?}",
                currency
            )));
        }

        let id = Uuid::new_v4();
        let slug = self.claim_slug(name, id);
        let channel = Channel {
            id,
            name: name.to_string(),
            slug: slug.clone(),
            currency,
            instruments: InstrumentFlags::default(),
            created_at: Utc::now(),
        };
        self.store.channels.insert(id, channel.clone());

        info!(%id, %slug, "channel created");
        self.events.send(Event::ChannelCreated(id)).await;
        Ok(channel)
    }

    pub fn get(&self, id: Uuid) -> Result<Channel, ServiceError> {
        self.store
            .channels
            .get(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Channel {} not found", id)))
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Channel, ServiceError> {
        self.store
            .channel_slugs
            .get(slug)
            .map(|entry| *entry.value())
            .and_then(|id| self.store.channels.get(&id))
            .ok_or_else(|| ServiceError::NotFound(format!("Channel {:?} not found", slug)))
    }

    pub fn list(&self) -> Vec<Channel> {
        let mut channels = self.store.channels.list();
        channels.sort_by(|a, b| a.slug.cmp(&b.slug));
        channels
    }

    /// Whether the given instrument kind is enabled for the channel.
    /// Unknown channels are an error, not a "disabled".
    pub fn is_instrument_enabled(
        &self,
        channel_id: Uuid,
        kind: InstrumentKind,
    ) -> Result<bool, ServiceError> {
        Ok(self.get(channel_id)?.instruments.is_enabled(kind))
    }

    /// Toggles one instrument-kind flag on a channel.
    #[instrument(skip(self))]
    pub async fn set_instrument_enabled(
        &self,
        channel_id: Uuid,
        kind: InstrumentKind,
        enabled: bool,
    ) -> Result<Channel, ServiceError> {
        let updated = self
            .store
            .channels
            .update(&channel_id, |channel| {
                channel.instruments.set(kind, enabled);
            })
            .ok_or_else(|| ServiceError::NotFound(format!("Channel {} not found", channel_id)))?;

        self.events
            .send(Event::ChannelInstrumentsChanged(channel_id))
            .await;
        Ok(updated)
    }

    /// Slugifies the name and claims a unique slug in the index, suffixing
    /// `-2`, `-3`, ... on collision.
    fn claim_slug(&self, name: &str, id: Uuid) -> String {
        let base = slugify(name);
        let mut candidate = base.clone();
        let mut counter = 2u32;
        loop {
            use dashmap::mapref::entry::Entry;
            match self.store.channel_slugs.entry(candidate.clone()) {
                Entry::Vacant(vacant) => {
                    vacant.insert(id);
                    return candidate;
                }
                Entry::Occupied(_) => {
                    candidate = format!("{}-{}", base, counter);
                    counter += 1;
                }
            }
        }
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "channel".to_string()
    } else {
        slug
    }
}
