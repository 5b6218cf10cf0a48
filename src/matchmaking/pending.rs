//! Pending match record
//!
//! A pending match pairs two players who must both accept before the room is
//! handed to the game-session collaborator. The record owns one accept timer
//! per player; dropping it cancels every timer it still holds.

use crate::matchmaking::timer::TimerHandle;
use crate::types::{PlayerId, RoomId};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

#[derive(Debug)]
pub struct PendingMatch {
    room_id: RoomId,
    /// Members in formation order
    players: [PlayerId; 2],
    /// Display names captured at formation, same order as `players`
    names: [String; 2],
    accepted_by: HashSet<PlayerId>,
    timers: HashMap<PlayerId, TimerHandle>,
    created_at: Instant,
}

impl PendingMatch {
    pub fn new(room_id: RoomId, players: [PlayerId; 2], names: [String; 2]) -> Self {
        Self {
            room_id,
            players,
            names,
            accepted_by: HashSet::new(),
            timers: HashMap::new(),
            created_at: Instant::now(),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn players(&self) -> &[PlayerId; 2] {
        &self.players
    }

    pub fn names(&self) -> &[String; 2] {
        &self.names
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_member(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p == player_id)
    }

    /// The other member, if `player_id` is a member
    pub fn opponent_of(&self, player_id: &str) -> Option<&PlayerId> {
        match &self.players {
            [a, b] if a == player_id => Some(b),
            [a, b] if b == player_id => Some(a),
            _ => None,
        }
    }

    pub fn has_accepted(&self, player_id: &str) -> bool {
        self.accepted_by.contains(player_id)
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted_by.len()
    }

    /// Record an acceptance and stop that player's timer.
    /// Returns false for non-members and repeated accepts.
    pub fn accept(&mut self, player_id: &str) -> bool {
        if !self.is_member(player_id) || self.has_accepted(player_id) {
            return false;
        }
        self.cancel_timer(player_id);
        self.accepted_by.insert(player_id.to_string());
        true
    }

    pub fn is_confirmed(&self) -> bool {
        self.players.iter().all(|p| self.accepted_by.contains(p))
    }

    pub fn set_timer(&mut self, player_id: PlayerId, handle: TimerHandle) {
        if let Some(previous) = self.timers.insert(player_id, handle) {
            previous.cancel();
        }
    }

    pub fn cancel_timer(&mut self, player_id: &str) {
        if let Some(handle) = self.timers.remove(player_id) {
            handle.cancel();
        }
    }

    pub fn cancel_all_timers(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.cancel();
        }
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for PendingMatch {
    fn drop(&mut self) {
        self.cancel_all_timers();
    }
}
