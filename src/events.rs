use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

/// Domain events emitted by the services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ChannelCreated(Uuid),
    ChannelInstrumentsChanged(Uuid),

    VoucherCreated { code: String },
    VoucherDeleted { code: String },
    VoucherApplied { checkout_id: Uuid, code: String },

    GiftCardIssued(Uuid),
    GiftCardUpdated(Uuid),
    GiftCardRedeemed { gift_card_id: Uuid, amount: Decimal },
    GiftCardReversed { gift_card_id: Uuid, amount: Decimal },
    GiftCardDeleted(Uuid),

    CheckoutCreated(Uuid),
    CheckoutCompleted { checkout_id: Uuid, order_id: String },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Enqueues an event, awaiting capacity when the channel is full.
    /// A closed channel is logged, never propagated into the calling
    /// operation.
    pub async fn send(&self, event: Event) {
        if let Err(err) = self.sender.send(event).await {
            error!("failed to enqueue event: {}", err);
        }
    }
}

/// Drains the event channel. Downstream consumers (webhooks, analytics)
/// hook in here; the default loop just records the stream.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        debug!(?event, "domain event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_through_the_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        sender.send(Event::ChannelCreated(Uuid::nil())).await;
        match rx.recv().await {
            Some(Event::ChannelCreated(id)) => assert_eq!(id, Uuid::nil()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_on_closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        sender.send(Event::GiftCardIssued(Uuid::nil())).await;
    }
}
