//! Inbound event queue between channels and the gateway.
//!
//! Channels publish normalized [`InboundEvent`]s; the gateway consumes them
//! one at a time and hands them to the dispatcher.

use crate::error::{BusError, BusResult};
use crate::events::InboundEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::trace;

/// Default capacity of the inbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Async event queue that decouples channels from the dispatch loop.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

struct EventBusInner {
    /// Inbound queue (channels → gateway).
    inbound_tx: mpsc::Sender<InboundEvent>,
    inbound_rx: Mutex<mpsc::Receiver<InboundEvent>>,

    /// Statistics.
    stats: RwLock<BusStats>,
}

/// Event bus statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Events published by channels.
    pub published: u64,
    /// Events taken by the gateway.
    pub consumed: u64,
}

impl EventBus {
    /// Create a new bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a new bus with the given queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity.max(1));

        Self {
            inner: Arc::new(EventBusInner {
                inbound_tx,
                inbound_rx: Mutex::new(inbound_rx),
                stats: RwLock::new(BusStats::default()),
            }),
        }
    }

    /// Publish an inbound event from a channel.
    pub async fn publish(&self, event: InboundEvent) -> BusResult<()> {
        trace!(conversation_id = event.conversation_id(), "publishing inbound event");

        self.inner
            .inbound_tx
            .send(event)
            .await
            .map_err(|_| BusError::InboundClosed)?;

        self.inner.stats.write().await.published += 1;
        Ok(())
    }

    /// Wait for the next inbound event.
    ///
    /// Returns `None` if nothing arrives within `timeout`.
    pub async fn consume_timeout(&self, timeout: Duration) -> Option<InboundEvent> {
        let mut rx = self.inner.inbound_rx.lock().await;
        let event = tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()?;
        drop(rx);

        self.inner.stats.write().await.consumed += 1;
        Some(event)
    }

    /// Current statistics.
    pub async fn stats(&self) -> BusStats {
        *self.inner.stats.read().await
    }

    /// Lightweight publishing handle for channel tasks.
    #[must_use]
    pub fn inbound_handle(&self) -> InboundHandle {
        InboundHandle { bus: self.clone() }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for publishing inbound events.
#[derive(Debug, Clone)]
pub struct InboundHandle {
    bus: EventBus,
}

impl InboundHandle {
    /// Publish an inbound event.
    pub async fn publish(&self, event: InboundEvent) -> BusResult<()> {
        self.bus.publish(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inbound_event_flow() {
        let bus = EventBus::new();
        bus.publish(InboundEvent::text(1, "/start")).await.unwrap();

        let received = bus.consume_timeout(Duration::from_millis(100)).await;
        assert_eq!(received, Some(InboundEvent::text(1, "/start")));
    }

    #[tokio::test]
    async fn test_consume_times_out_when_empty() {
        let bus = EventBus::with_capacity(4);
        assert!(bus.consume_timeout(Duration::from_millis(10)).await.is_none());
    }

    #[tokio::test]
    async fn test_order_and_stats() {
        let bus = EventBus::new();
        let handle = bus.inbound_handle();
        handle.publish(InboundEvent::text(1, "a")).await.unwrap();
        handle
            .publish(InboundEvent::callback(1, 5, "cb", "style:bottts"))
            .await
            .unwrap();

        let first = bus.consume_timeout(Duration::from_millis(100)).await.unwrap();
        assert_eq!(first, InboundEvent::text(1, "a"));
        let second = bus.consume_timeout(Duration::from_millis(100)).await.unwrap();
        assert_eq!(second.callback_id(), Some("cb"));

        assert_eq!(
            bus.stats().await,
            BusStats {
                published: 2,
                consumed: 2
            }
        );
    }
}
