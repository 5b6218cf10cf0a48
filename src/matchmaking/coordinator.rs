//! Match coordinator
//!
//! The coordinator owns presence, the queue and every pending match. It is a
//! plain synchronous state machine: each operation runs to completion and
//! either applies fully or is a no-op. Concurrency is handled one level up by
//! the actor task that feeds it commands one at a time.
//!
//! A pending match moves `Pending -> Confirmed` when both members accept, or
//! `Pending -> Cancelled` on a reject or timeout. Either way the record is
//! deleted in the same step that resolves it.

use crate::config::MatchmakingSettings;
use crate::matchmaking::pending::PendingMatch;
use crate::matchmaking::queue::MatchQueue;
use crate::matchmaking::timer::TimerScheduler;
use crate::metrics::MetricsCollector;
use crate::notify::Notifier;
use crate::presence::{ConnectionHandle, PresenceRegistry};
use crate::session::GameSessionProvider;
use crate::types::{
    ConnectionId, GameSessionRequest, MatchOutcome, PlayerId, RoomId, ServerEvent, SessionPlayer,
};
use crate::utils::{current_timestamp, generate_room_id};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Snapshot of coordinator state and cumulative counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub online_players: usize,
    pub queued_players: usize,
    pub pending_matches: usize,
    pub matches_formed: u64,
    pub matches_confirmed: u64,
    pub matches_rejected: u64,
    pub matches_timed_out: u64,
    pub sessions_created: u64,
    pub sessions_failed: u64,
}

pub struct MatchCoordinator {
    settings: MatchmakingSettings,
    presence: PresenceRegistry,
    queue: MatchQueue,
    pending: HashMap<RoomId, PendingMatch>,
    /// Reverse index of pending membership
    player_rooms: HashMap<PlayerId, RoomId>,
    notifier: Arc<dyn Notifier>,
    sessions: Arc<dyn GameSessionProvider>,
    timers: Box<dyn TimerScheduler>,
    rng: StdRng,
    stats: CoordinatorStats,
    metrics: Option<Arc<MetricsCollector>>,
}

impl MatchCoordinator {
    pub fn new(
        settings: MatchmakingSettings,
        notifier: Arc<dyn Notifier>,
        sessions: Arc<dyn GameSessionProvider>,
        timers: Box<dyn TimerScheduler>,
    ) -> Self {
        info!(
            "Creating match coordinator (accept window {}s, resolve pending on disconnect: {})",
            settings.accept_timeout_seconds, settings.resolve_pending_on_disconnect
        );

        Self {
            settings,
            presence: PresenceRegistry::new(),
            queue: MatchQueue::new(),
            pending: HashMap::new(),
            player_rooms: HashMap::new(),
            notifier,
            sessions,
            timers,
            rng: StdRng::from_entropy(),
            stats: CoordinatorStats::default(),
            metrics: None,
        }
    }

    /// Use a fixed random source for room ids and starter selection
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a connected player and broadcast the new online count
    pub fn connect(&mut self, player_id: PlayerId, display_name: String, handle: ConnectionHandle) {
        let conn_id = handle.conn_id();
        let replaced = self
            .presence
            .register(player_id.clone(), handle, display_name.clone());

        match replaced {
            Some(previous) => info!(
                "Player {} ({}) reconnected on {}, replacing {}",
                player_id,
                display_name,
                conn_id,
                previous.handle.conn_id()
            ),
            None => info!(
                "Player {} ({}) connected on {}",
                player_id, display_name, conn_id
            ),
        }

        self.broadcast_online_count();
    }

    /// Tear down a player's presence when connection `conn_id` closes.
    /// A close from a connection that has since been replaced is ignored.
    pub fn disconnect(&mut self, player_id: &str, conn_id: ConnectionId) {
        if !self.presence.is_current(player_id, conn_id) {
            debug!(
                "Ignoring disconnect of stale connection {} for player {}",
                conn_id, player_id
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_stale_disconnect();
            }
            return;
        }

        self.presence.unregister(player_id);
        let was_queued = self.queue.remove(player_id);
        info!(
            "Player {} disconnected (was queued: {})",
            player_id, was_queued
        );

        self.broadcast_online_count();

        if !self.settings.resolve_pending_on_disconnect {
            return;
        }
        let Some(room_id) = self.player_rooms.get(player_id).cloned() else {
            return;
        };
        let undecided = self
            .pending
            .get(&room_id)
            .map(|m| !m.has_accepted(player_id))
            .unwrap_or(false);
        if undecided {
            info!(
                "Resolving room {} as timeout after {} disconnected",
                room_id, player_id
            );
            self.handle_timeout(&room_id, player_id);
        }
    }

    /// Put a connected player in the queue and try to form matches
    pub fn join_queue(&mut self, player_id: &str) {
        if !self.presence.contains(player_id) {
            debug!("Ignoring queue join from unknown player {}", player_id);
            return;
        }
        if let Some(room_id) = self.player_rooms.get(player_id) {
            debug!(
                "Ignoring queue join from {} while pending in room {}",
                player_id, room_id
            );
            return;
        }

        if self.queue.enqueue(player_id.to_string()) {
            info!(
                "Player {} joined the queue ({} waiting)",
                player_id,
                self.queue.len()
            );
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_queue_join();
        }
        self.notify(player_id, ServerEvent::QueueJoined);

        self.run_formation();
    }

    pub fn leave_queue(&mut self, player_id: &str) {
        if !self.presence.contains(player_id) {
            debug!("Ignoring queue leave from unknown player {}", player_id);
            return;
        }
        if self.queue.remove(player_id) {
            info!("Player {} left the queue", player_id);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_queue_leave();
        }
        self.notify(player_id, ServerEvent::QueueLeft);
    }

    /// Record an acceptance; confirms the match once both members accepted
    pub fn accept(&mut self, player_id: &str, room_id: &str) {
        let Some(pending) = self.pending.get_mut(room_id) else {
            debug!(
                "Ignoring accept from {} for unknown room {}",
                player_id, room_id
            );
            return;
        };
        if !pending.accept(player_id) {
            debug!(
                "Ignoring accept from {} for room {} (not a member or already accepted)",
                player_id, room_id
            );
            return;
        }

        let latency = pending.created_at().elapsed();
        let confirmed = pending.is_confirmed();
        if let Some(metrics) = &self.metrics {
            metrics.record_accept_latency(latency);
        }
        info!(
            "Player {} accepted room {} after {:?}",
            player_id, room_id, latency
        );

        if confirmed {
            self.confirm(room_id);
        }
    }

    /// A member turned the match down: cancel it and return the other member
    /// to the queue
    pub fn reject(&mut self, player_id: &str, room_id: &str) {
        let is_member = self
            .pending
            .get(room_id)
            .map(|m| m.is_member(player_id))
            .unwrap_or(false);
        if !is_member {
            debug!(
                "Ignoring reject from {} for room {} (unknown room or not a member)",
                player_id, room_id
            );
            return;
        }
        let Some(pending) = self.remove_pending(room_id) else {
            return;
        };

        info!("Player {} rejected room {}", player_id, room_id);

        let event = ServerEvent::MatchRejected {
            rejected_player_id: player_id.to_string(),
        };
        for member in pending.players() {
            self.notify(member, event.clone());
        }

        self.queue.remove(player_id);
        if let Some(other) = pending.opponent_of(player_id) {
            self.requeue_if_present(other);
        }
        drop(pending);

        self.stats.matches_rejected += 1;
        if let Some(metrics) = &self.metrics {
            metrics.record_match_resolved(MatchOutcome::Rejected);
        }

        self.run_formation();
    }

    /// A member's accept window ran out
    ///
    /// Ignored if the match is gone or the player already accepted. The first
    /// timeout ends the match and cancels the remaining timer.
    pub fn handle_timeout(&mut self, room_id: &str, player_id: &str) {
        let undecided_member = self
            .pending
            .get(room_id)
            .map(|m| m.is_member(player_id) && !m.has_accepted(player_id))
            .unwrap_or(false);
        if !undecided_member {
            debug!(
                "Ignoring timeout for {} in room {} (resolved or already accepted)",
                player_id, room_id
            );
            return;
        }
        let Some(pending) = self.remove_pending(room_id) else {
            return;
        };

        info!("Player {} timed out in room {}", player_id, room_id);

        let event = ServerEvent::MatchTimeout {
            timed_out_player_id: player_id.to_string(),
        };
        for member in pending.players() {
            self.notify(member, event.clone());
        }

        self.queue.remove(player_id);
        if let Some(other) = pending.opponent_of(player_id) {
            if pending.has_accepted(other) {
                self.requeue_if_present(other);
            }
        }
        drop(pending);

        self.stats.matches_timed_out += 1;
        if let Some(metrics) = &self.metrics {
            metrics.record_match_resolved(MatchOutcome::TimedOut);
        }

        self.run_formation();
    }

    /// Current state and cumulative counters
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            online_players: self.presence.count(),
            queued_players: self.queue.len(),
            pending_matches: self.pending.len(),
            ..self.stats.clone()
        }
    }

    /// Push current gauges to the metrics collector, if any
    pub fn publish_gauges(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.update_from_stats(&self.stats());
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn queue(&self) -> &MatchQueue {
        &self.queue
    }

    pub fn pending_match(&self, room_id: &str) -> Option<&PendingMatch> {
        self.pending.get(room_id)
    }

    /// Room of the pending match `player_id` belongs to
    pub fn pending_room_of(&self, player_id: &str) -> Option<&RoomId> {
        self.player_rooms.get(player_id)
    }

    pub fn pending_rooms(&self) -> impl Iterator<Item = &RoomId> {
        self.pending.keys()
    }

    /// Pair queued players two at a time until fewer than two remain
    fn run_formation(&mut self) {
        while let Some((first, second)) = self.queue.dequeue_two() {
            self.form_match(first, second);
        }
    }

    fn form_match(&mut self, first: PlayerId, second: PlayerId) {
        let room_id = self.allocate_room_id();
        let names = [self.display_name_of(&first), self.display_name_of(&second)];

        let mut pending = PendingMatch::new(
            room_id.clone(),
            [first.clone(), second.clone()],
            names.clone(),
        );
        let window = std::time::Duration::from_secs(self.settings.accept_timeout_seconds);
        for player in [&first, &second] {
            let handle = self.timers.schedule(room_id.clone(), player.clone(), window);
            pending.set_timer(player.clone(), handle);
        }

        self.player_rooms.insert(first.clone(), room_id.clone());
        self.player_rooms.insert(second.clone(), room_id.clone());
        self.pending.insert(room_id.clone(), pending);

        self.stats.matches_formed += 1;
        if let Some(metrics) = &self.metrics {
            metrics.record_match_formed();
        }
        info!(
            "Formed room {}: {} ({}) vs {} ({})",
            room_id, first, names[0], second, names[1]
        );

        let [first_name, second_name] = names;
        self.notify(
            &first,
            ServerEvent::MatchRequest {
                room_id: room_id.clone(),
                opponent_name: second_name,
            },
        );
        self.notify(
            &second,
            ServerEvent::MatchRequest {
                room_id,
                opponent_name: first_name,
            },
        );
    }

    fn confirm(&mut self, room_id: &str) {
        let Some(pending) = self.remove_pending(room_id) else {
            return;
        };

        let starter_index = self.rng.gen_range(0..2);
        let players = pending.players().clone();
        let names = pending.names().clone();
        drop(pending);

        info!(
            "Room {} confirmed: {} vs {}, {} starts",
            room_id, names[0], names[1], names[starter_index]
        );

        let event = ServerEvent::MatchAccepted {
            room_id: room_id.to_string(),
            players: names.to_vec(),
            starter: names[starter_index].clone(),
        };
        for member in &players {
            self.notify(member, event.clone());
        }

        self.stats.matches_confirmed += 1;
        if let Some(metrics) = &self.metrics {
            metrics.record_match_resolved(MatchOutcome::Confirmed);
        }

        let [first_id, second_id] = players;
        let [first_name, second_name] = names;
        let starter = if starter_index == 0 {
            first_id.clone()
        } else {
            second_id.clone()
        };
        let request = GameSessionRequest {
            room_id: room_id.to_string(),
            players: [
                SessionPlayer {
                    player_id: first_id,
                    display_name: first_name,
                },
                SessionPlayer {
                    player_id: second_id,
                    display_name: second_name,
                },
            ],
            starter,
            created_at: current_timestamp(),
        };

        match self.sessions.create_session(request) {
            Ok(session_room) => {
                self.stats.sessions_created += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.record_session_created(true);
                }
                debug!("Game session {} opened", session_room);
            }
            Err(e) => {
                self.stats.sessions_failed += 1;
                if let Some(metrics) = &self.metrics {
                    metrics.record_session_created(false);
                }
                error!("Failed to create game session for room {}: {}", room_id, e);
            }
        }
    }

    /// Delete a pending match and its membership index entries
    fn remove_pending(&mut self, room_id: &str) -> Option<PendingMatch> {
        let pending = self.pending.remove(room_id)?;
        for member in pending.players() {
            if self.player_rooms.get(member).map(String::as_str) == Some(room_id) {
                self.player_rooms.remove(member);
            }
        }
        Some(pending)
    }

    fn requeue_if_present(&mut self, player_id: &str) {
        if !self.presence.contains(player_id) {
            debug!("Not re-queueing {}: no longer connected", player_id);
            return;
        }
        if self.queue.enqueue(player_id.to_string()) {
            info!("Player {} returned to the queue", player_id);
        }
    }

    fn allocate_room_id(&mut self) -> RoomId {
        loop {
            let candidate = generate_room_id(&mut self.rng, self.settings.room_id_length);
            if !self.pending.contains_key(&candidate) {
                return candidate;
            }
            warn!("Room id collision on {}, retrying", candidate);
        }
    }

    fn display_name_of(&self, player_id: &str) -> String {
        self.presence
            .display_name(player_id)
            .map(str::to_string)
            .unwrap_or_else(|| player_id.to_string())
    }

    fn notify(&self, player_id: &str, event: ServerEvent) {
        self.notifier.send_to(&self.presence, player_id, &event);
    }

    fn broadcast_online_count(&self) {
        let event = ServerEvent::OnlineCount {
            count: self.presence.count(),
        };
        let delivered = self.notifier.broadcast(&self.presence, &event);
        debug!("Broadcast online count to {} players", delivered);
    }
}
