//! Delivery of coordinator decisions to connected players
//!
//! Notifications are best effort: a player who is not in the presence
//! registry, or whose transport has gone away, simply misses the event.
//! Nothing is retried or buffered for later.

use crate::metrics::MetricsCollector;
use crate::presence::PresenceRegistry;
use crate::types::{PlayerId, ServerEvent};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Push channel from the coordinator to players
pub trait Notifier: Send + Sync {
    /// Send an event to one player. Returns true if it was handed to a live
    /// connection.
    fn send_to(&self, presence: &PresenceRegistry, player_id: &str, event: &ServerEvent) -> bool;

    /// Send an event to every registered player. Returns the number delivered.
    fn broadcast(&self, presence: &PresenceRegistry, event: &ServerEvent) -> usize {
        presence
            .player_ids()
            .filter(|player_id| self.send_to(presence, player_id, event))
            .count()
    }
}

/// Notifier that writes into each connection's outbound channel
#[derive(Default)]
pub struct ChannelNotifier {
    metrics: Option<Arc<MetricsCollector>>,
}

impl ChannelNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }
}

impl Notifier for ChannelNotifier {
    fn send_to(&self, presence: &PresenceRegistry, player_id: &str, event: &ServerEvent) -> bool {
        let delivered = match presence.lookup(player_id) {
            Some(handle) => handle.send(event.clone()),
            None => false,
        };

        if !delivered {
            debug!("Dropped {} for player {}", event.kind(), player_id);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_notification(event.kind(), delivered);
        }

        delivered
    }
}

/// Notifier that records what would have been delivered
#[derive(Debug, Default)]
pub struct MockNotifier {
    delivered: Mutex<Vec<(PlayerId, ServerEvent)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivered event in order
    pub fn events(&self) -> Vec<(PlayerId, ServerEvent)> {
        self.delivered
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events delivered to one player, in order
    pub fn events_for(&self, player_id: &str) -> Vec<ServerEvent> {
        self.events()
            .into_iter()
            .filter(|(recipient, _)| recipient == player_id)
            .map(|(_, event)| event)
            .collect()
    }

    /// Number of delivered events of one kind, across all players
    pub fn count_kind(&self, kind: &str) -> usize {
        self.events()
            .iter()
            .filter(|(_, event)| event.kind() == kind)
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.delivered.lock() {
            events.clear();
        }
    }
}

impl Notifier for MockNotifier {
    fn send_to(&self, presence: &PresenceRegistry, player_id: &str, event: &ServerEvent) -> bool {
        if !presence.contains(player_id) {
            return false;
        }
        if let Ok(mut events) = self.delivered.lock() {
            events.push((player_id.to_string(), event.clone()));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::ConnectionHandle;

    #[test]
    fn test_channel_notifier_delivers_and_drops() {
        let mut presence = PresenceRegistry::new();
        let (handle, mut rx) = ConnectionHandle::new();
        presence.register("p1".to_string(), handle, "Alice".to_string());

        let notifier = ChannelNotifier::new();
        assert!(notifier.send_to(&presence, "p1", &ServerEvent::QueueJoined));
        assert!(!notifier.send_to(&presence, "p2", &ServerEvent::QueueJoined));

        assert_eq!(rx.try_recv().ok(), Some(ServerEvent::QueueJoined));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_reaches_every_player() {
        let mut presence = PresenceRegistry::new();
        let (h1, mut rx1) = ConnectionHandle::new();
        let (h2, mut rx2) = ConnectionHandle::new();
        let (h3, rx3) = ConnectionHandle::new();
        presence.register("p1".to_string(), h1, "Alice".to_string());
        presence.register("p2".to_string(), h2, "Bob".to_string());
        presence.register("p3".to_string(), h3, "Carol".to_string());
        drop(rx3);

        let metrics = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let notifier = ChannelNotifier::with_metrics(metrics);
        let event = ServerEvent::OnlineCount { count: 3 };

        assert_eq!(notifier.broadcast(&presence, &event), 2);
        assert_eq!(rx1.try_recv().ok(), Some(event.clone()));
        assert_eq!(rx2.try_recv().ok(), Some(event));
    }

    #[test]
    fn test_mock_notifier_records_only_present_players() {
        let mut presence = PresenceRegistry::new();
        let (handle, _rx) = ConnectionHandle::new();
        presence.register("p1".to_string(), handle, "Alice".to_string());

        let notifier = MockNotifier::new();
        notifier.send_to(&presence, "p1", &ServerEvent::QueueJoined);
        notifier.send_to(&presence, "ghost", &ServerEvent::QueueJoined);

        assert_eq!(notifier.events_for("p1"), vec![ServerEvent::QueueJoined]);
        assert_eq!(notifier.count_kind("queueJoined"), 1);

        notifier.clear();
        assert!(notifier.events().is_empty());
    }
}
