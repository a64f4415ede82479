//! In-process lifecycle event bus.
//!
//! Uses `tokio::sync::broadcast` for multi-consumer fan-out. Publishing never
//! blocks; slow subscribers lag and lose the oldest events.

use crate::domain::AuctionId;
use crate::events::AuctionEvent;
use crate::ports::outbound::AuctionEventPublisher;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

/// Default channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

pub struct BroadcastEventBus {
    sender: broadcast::Sender<AuctionEvent>,
    events_published: AtomicU64,
    capacity: usize,
}

impl BroadcastEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuctionEvent> {
        self.sender.subscribe()
    }

    /// Stream of events, optionally limited to one auction. Lagged gaps are
    /// logged and skipped.
    pub fn stream(&self, auction: Option<AuctionId>) -> impl Stream<Item = AuctionEvent> {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| match item {
            Ok(event) if auction.map_or(true, |id| event.auction_id() == id) => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "auction event subscriber lagged");
                None
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AuctionEventPublisher for BroadcastEventBus {
    fn publish(&self, event: AuctionEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        let name = event.name();
        let auction_id = event.auction_id();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(event = name, %auction_id, receivers, "auction event published");
                receivers
            }
            // No subscribers. Not an error.
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BidderId;

    fn claimed(auction_id: AuctionId) -> AuctionEvent {
        AuctionEvent::AssetClaimed {
            auction_id,
            bidder: BidderId::new("w"),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = BroadcastEventBus::new();
        assert_eq!(bus.publish(claimed(AuctionId::new())), 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = BroadcastEventBus::with_capacity(8);
        let mut rx = bus.subscribe();
        let id = AuctionId::new();
        assert_eq!(bus.publish(claimed(id)), 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.auction_id(), id);
    }

    #[tokio::test]
    async fn test_stream_filters_by_auction() {
        let bus = BroadcastEventBus::with_capacity(8);
        let wanted = AuctionId::new();
        let stream = bus.stream(Some(wanted));
        tokio::pin!(stream);

        bus.publish(claimed(AuctionId::new()));
        bus.publish(claimed(wanted));

        let event = stream.next().await.unwrap();
        assert_eq!(event.auction_id(), wanted);
    }
}
