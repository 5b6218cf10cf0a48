//! Presence registry
//!
//! Tracks which players are currently connected and the live connection
//! handle events for them are pushed through. At most one entry exists per
//! player; a later connect for the same player replaces the earlier one.

use crate::types::{ConnectionId, PlayerId, ServerEvent};
use crate::utils::{current_timestamp, generate_connection_id};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Push side of a single client connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    conn_id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    /// Create a handle with a fresh connection id and the receiver the
    /// transport drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                conn_id: generate_connection_id(),
                tx,
            },
            rx,
        )
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Push an event without blocking. Returns false if the transport is gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A connected player
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub player_id: PlayerId,
    pub display_name: String,
    pub handle: ConnectionHandle,
    pub connected_at: DateTime<Utc>,
}

/// Registry of connected players, keyed by player id
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: HashMap<PlayerId, PresenceEntry>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player's connection, replacing any earlier entry for the
    /// same player. Returns the replaced entry.
    pub fn register(
        &mut self,
        player_id: PlayerId,
        handle: ConnectionHandle,
        display_name: String,
    ) -> Option<PresenceEntry> {
        let entry = PresenceEntry {
            player_id: player_id.clone(),
            display_name,
            handle,
            connected_at: current_timestamp(),
        };
        self.entries.insert(player_id, entry)
    }

    /// Remove a player. No-op if absent.
    pub fn unregister(&mut self, player_id: &str) -> Option<PresenceEntry> {
        self.entries.remove(player_id)
    }

    pub fn lookup(&self, player_id: &str) -> Option<&ConnectionHandle> {
        self.entries.get(player_id).map(|entry| &entry.handle)
    }

    pub fn entry(&self, player_id: &str) -> Option<&PresenceEntry> {
        self.entries.get(player_id)
    }

    pub fn display_name(&self, player_id: &str) -> Option<&str> {
        self.entries
            .get(player_id)
            .map(|entry| entry.display_name.as_str())
    }

    /// Whether `conn_id` is still the live connection for `player_id`
    pub fn is_current(&self, player_id: &str, conn_id: ConnectionId) -> bool {
        self.entries
            .get(player_id)
            .map(|entry| entry.handle.conn_id() == conn_id)
            .unwrap_or(false)
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.entries.contains_key(player_id)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn player_ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = PresenceRegistry::new();
        let (handle, _rx) = ConnectionHandle::new();
        let conn_id = handle.conn_id();

        assert!(registry
            .register("p1".to_string(), handle, "Alice".to_string())
            .is_none());

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.display_name("p1"), Some("Alice"));
        assert_eq!(registry.lookup("p1").map(|h| h.conn_id()), Some(conn_id));
        assert!(registry.lookup("p2").is_none());
    }

    #[test]
    fn test_register_overwrites_previous_connection() {
        let mut registry = PresenceRegistry::new();
        let (first, _rx1) = ConnectionHandle::new();
        let (second, _rx2) = ConnectionHandle::new();
        let first_id = first.conn_id();
        let second_id = second.conn_id();

        registry.register("p1".to_string(), first, "Alice".to_string());
        let replaced = registry.register("p1".to_string(), second, "Alice B".to_string());

        assert_eq!(replaced.map(|e| e.handle.conn_id()), Some(first_id));
        assert_eq!(registry.count(), 1);
        assert!(registry.is_current("p1", second_id));
        assert!(!registry.is_current("p1", first_id));
        assert_eq!(registry.display_name("p1"), Some("Alice B"));
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let mut registry = PresenceRegistry::new();
        assert!(registry.unregister("ghost").is_none());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_handle_send_after_receiver_dropped() {
        let (handle, rx) = ConnectionHandle::new();
        assert!(handle.send(ServerEvent::QueueJoined));
        drop(rx);
        assert!(handle.is_closed());
        assert!(!handle.send(ServerEvent::QueueLeft));
    }
}
