// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal typed event bus for the Parley DIDComm agent.
//!
//! State transitions are published as [`BusEvent`]s on a tokio broadcast
//! channel. Bounded waits for asynchronous confirmations (mediation grant,
//! connection reuse) subscribe before triggering the action, then race the
//! subscription against a timeout. Dropping the subscription on exit means a
//! late confirmation has nowhere to go: the first result wins.

pub mod events;

use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub use events::{BusEvent, EventKind, StateChanged};

/// Default broadcast buffer per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Failure modes of a bounded wait.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
    #[error("no matching event within {0:?}")]
    Timeout(Duration),

    #[error("event bus closed")]
    Closed,
}

/// Broadcast bus for agent events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, kind: EventKind) -> BusEvent {
        let event = BusEvent::new(kind);
        let receivers = self.tx.send(event.clone()).unwrap_or(0);
        debug!(event_id = %event.id, receivers, "event published");
        event
    }

    /// Subscribes to every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    /// Subscribes and waits for the first event accepted by `filter`.
    ///
    /// Only events published after this call are observed. When the triggering
    /// action must run between subscribing and waiting, use [`subscribe`](Self::subscribe)
    /// and [`wait_for_event`].
    pub async fn wait_for<T, F>(&self, timeout: Duration, filter: F) -> Result<T, WaitError>
    where
        F: FnMut(&BusEvent) -> Option<T>,
    {
        wait_for_event(self.subscribe(), timeout, filter).await
    }
}

/// Waits on an existing subscription for the first event accepted by `filter`.
///
/// The receiver is consumed and dropped on return, so nothing observes events
/// published after the timeout fires.
pub async fn wait_for_event<T, F>(
    mut rx: broadcast::Receiver<BusEvent>,
    timeout: Duration,
    mut filter: F,
) -> Result<T, WaitError>
where
    F: FnMut(&BusEvent) -> Option<T>,
{
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(found) = filter(&event) {
                        return Ok(found);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "bus subscriber lagged; some events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(WaitError::Closed),
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(WaitError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_changed(record_id: &str, state: &str) -> EventKind {
        EventKind::StateChanged(StateChanged {
            record_type: "MediationRecord".into(),
            record_id: record_id.into(),
            previous_state: Some("requested".into()),
            state: state.into(),
            thread_id: None,
            connection_id: None,
            record: serde_json::Value::Null,
        })
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let published = bus.publish(state_changed("m1", "granted"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received, published);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = EventBus::default();
        bus.publish(state_changed("m1", "granted"));
    }

    #[tokio::test]
    async fn wait_returns_first_matching_event() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        bus.publish(state_changed("other", "granted"));
        bus.publish(state_changed("m1", "granted"));
        bus.publish(state_changed("m1", "denied"));

        let state = wait_for_event(rx, Duration::from_secs(1), |e| {
            e.as_state_changed()
                .filter(|c| c.record_id == "m1")
                .map(|c| c.state.clone())
        })
        .await
        .unwrap();
        assert_eq!(state, "granted");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_without_match() {
        let bus = EventBus::default();
        let result = bus
            .wait_for(Duration::from_millis(50), |e| e.as_state_changed().map(|_| ()))
            .await;
        assert_eq!(result, Err(WaitError::Timeout(Duration::from_millis(50))));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_wait_releases_its_subscription() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        assert_eq!(bus.tx.receiver_count(), 1);
        let _ = wait_for_event(rx, Duration::from_millis(10), |_| Some(())).await;
        assert_eq!(bus.tx.receiver_count(), 0);
    }
}
