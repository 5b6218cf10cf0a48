//! Game session collaborator
//!
//! Once both players accept, the coordinator asks a `GameSessionProvider` to
//! open the game room. The call happens after the match has been resolved in
//! memory; a failure is logged and counted but never undoes the resolution.

use crate::error::{MatchmakingError, Result};
use crate::types::{GameSessionRequest, RoomId};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// Creates game sessions for confirmed matches
#[cfg_attr(test, mockall::automock)]
pub trait GameSessionProvider: Send + Sync {
    /// Open a session for a confirmed match and return its room id
    fn create_session(&self, request: GameSessionRequest) -> Result<RoomId>;
}

/// In-process session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<RoomId, GameSessionRequest>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, room_id: &str) -> Option<GameSessionRequest> {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(room_id).cloned())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored sessions, oldest first
    pub fn sessions(&self) -> Vec<GameSessionRequest> {
        let mut sessions: Vec<GameSessionRequest> = self
            .sessions
            .read()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }
}

impl GameSessionProvider for InMemorySessionStore {
    fn create_session(&self, request: GameSessionRequest) -> Result<RoomId> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "session store lock poisoned".to_string(),
            })?;

        if sessions.contains_key(&request.room_id) {
            return Err(MatchmakingError::SessionCreationFailed {
                room_id: request.room_id.clone(),
                reason: "room already has a session".to_string(),
            }
            .into());
        }

        let room_id = request.room_id.clone();
        info!(
            "Created game session {} for {} vs {} (starter {})",
            room_id,
            request.players[0].display_name,
            request.players[1].display_name,
            request.starter
        );
        sessions.insert(room_id.clone(), request);
        Ok(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionPlayer;
    use chrono::Utc;

    fn request(room_id: &str) -> GameSessionRequest {
        GameSessionRequest {
            room_id: room_id.to_string(),
            players: [
                SessionPlayer {
                    player_id: "a".to_string(),
                    display_name: "Alice".to_string(),
                },
                SessionPlayer {
                    player_id: "b".to_string(),
                    display_name: "Bob".to_string(),
                },
            ],
            starter: "a".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_get_session() {
        let store = InMemorySessionStore::new();
        assert!(store.is_empty());

        let room_id = store.create_session(request("room1")).unwrap();
        assert_eq!(room_id, "room1");
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("room1").map(|s| s.starter),
            Some("a".to_string())
        );
    }

    #[test]
    fn test_duplicate_room_rejected() {
        let store = InMemorySessionStore::new();
        tokio_test::assert_ok!(store.create_session(request("room1")));
        tokio_test::assert_err!(store.create_session(request("room1")));
        assert_eq!(store.sessions().len(), 1);
    }
}
