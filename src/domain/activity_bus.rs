//! Broadcast channel for domain activities.
//!
//! [`ActivityBus`] wraps a [`tokio::sync::broadcast`] channel. Services
//! publish an [`Activity`] after each mutation and every WebSocket
//! connection subscribes to receive the ones it asked for.

use tokio::sync::broadcast;

use super::Activity;

/// Broadcast bus for [`Activity`] values.
///
/// When the ring buffer is full, the oldest activities are dropped for
/// lagging receivers.
#[derive(Debug, Clone)]
pub struct ActivityBus {
    sender: broadcast::Sender<Activity>,
}

impl ActivityBus {
    /// Creates a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an activity to all subscribers.
    ///
    /// Returns the number of receivers reached; with no receivers the
    /// activity is silently dropped.
    pub fn publish(&self, activity: Activity) -> usize {
        self.sender.send(activity).unwrap_or(0)
    }

    /// Creates a receiver for all future activities.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Activity> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::EventId;

    fn deleted(event_id: EventId) -> Activity {
        Activity::EventDeleted {
            event_id,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = ActivityBus::new(16);
        assert_eq!(bus.publish(deleted(EventId::new())), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_the_same_activity() {
        let bus = ActivityBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let id = EventId::new();
        assert_eq!(bus.publish(deleted(id)), 2);

        let Ok(a) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(b) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(a.event_id(), id);
        assert_eq!(b.event_id(), id);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = ActivityBus::new(16);
        let rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);
        drop(rx);
        assert_eq!(bus.receiver_count(), 0);
    }
}
