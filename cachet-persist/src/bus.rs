//! Process-wide change-notification broadcast.
//!
//! Built on a tokio broadcast channel: best-effort, at-most-once per
//! subscriber per emission, delivery order per subscriber matching emission
//! order. A subscriber not currently listening misses the event; a slow
//! subscriber whose buffer overflows loses the oldest events (lagged).

use cachet_core::{ChangeEvent, EventFilter};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

/// Broadcast bus multiplexing change events to any number of subscribers.
#[derive(Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    /// Create a bus with the given per-subscriber buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Non-blocking. No subscribers is not an error; the event is simply
    /// dropped.
    pub fn publish(&self, event: ChangeEvent) {
        let event_type = event.event_type();
        let kind = event.kind().as_str();
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(event_type, kind, receivers, "Published change event");
            }
            Err(_) => {
                debug!(event_type, kind, "No subscribers for change event");
            }
        }
    }

    /// Subscribe to the raw event stream.
    ///
    /// The receiver must be polled to avoid lagging.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Subscribe with an allow-list filter; an empty filter admits all
    /// events. This is the surface the presentation layer consumes.
    ///
    /// Lagged gaps are logged and skipped rather than surfaced - this is a
    /// best-effort notification stream, not a journal.
    pub fn output(&self, filter: EventFilter) -> impl Stream<Item = ChangeEvent> {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |result| match result {
            Ok(event) if filter.admits(&event) => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Change-event subscriber lagged; dropping events");
                None
            }
        })
    }

    /// Number of live subscribers, for diagnostics.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
