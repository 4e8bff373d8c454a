pub mod channels;
pub mod checkouts;
pub mod gift_cards;
pub mod vouchers;

use std::sync::Arc;

use crate::events::EventSender;
use crate::services::checkouts::OrderCollaborator;
use crate::store::Store;

/// Aggregated services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub channels: Arc<channels::ChannelService>,
    pub vouchers: Arc<vouchers::VoucherService>,
    pub gift_cards: Arc<gift_cards::GiftCardService>,
    pub checkouts: Arc<checkouts::CheckoutService>,
}

impl AppServices {
    pub fn new(
        store: Arc<Store>,
        events: EventSender,
        collaborator: Arc<dyn OrderCollaborator>,
    ) -> Self {
        let channels = Arc::new(channels::ChannelService::new(store.clone(), events.clone()));
        let vouchers = Arc::new(vouchers::VoucherService::new(
            store.clone(),
            channels.clone(),
            events.clone(),
        ));
        let gift_cards = Arc::new(gift_cards::GiftCardService::new(
            store.clone(),
            events.clone(),
        ));
        let checkouts = Arc::new(checkouts::CheckoutService::new(
            store,
            channels.clone(),
            vouchers.clone(),
            gift_cards.clone(),
            events,
            collaborator,
        ));
        Self {
            channels,
            vouchers,
            gift_cards,
            checkouts,
        }
    }
}
