//! Common types used throughout the matchmaking service

use crate::error::MatchmakingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable player identifier supplied by the client at connection time
pub type PlayerId = String;

/// Short random token naming a pending match (and the game room it becomes)
pub type RoomId = String;

/// Identifier of a single accepted socket
pub type ConnectionId = Uuid;

/// Handshake data carried by a new connection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Handshake {
    #[serde(rename = "playerId")]
    pub player_id: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

impl Handshake {
    /// Player id and display name, or why the connection stays inert.
    ///
    /// The player id is opaque and kept as sent; only a blank one is refused.
    /// The display name is trimmed.
    pub fn identity(&self) -> std::result::Result<(PlayerId, String), MatchmakingError> {
        let player_id = match self.player_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            Some(_) => return Err(invalid_handshake("blank playerId")),
            None => return Err(invalid_handshake("missing playerId")),
        };
        let display_name = match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            Some(_) => return Err(invalid_handshake("blank displayName")),
            None => return Err(invalid_handshake("missing displayName")),
        };
        Ok((player_id.to_string(), display_name.to_string()))
    }
}

fn invalid_handshake(reason: &str) -> MatchmakingError {
    MatchmakingError::InvalidHandshake {
        reason: reason.to_string(),
    }
}

/// Messages a client can send over its event channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    JoinQueue,
    LeaveQueue,
    AcceptMatch {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    RejectMatch {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    Disconnect,
}

impl ClientMessage {
    /// Decode one text frame
    pub fn parse(text: &str) -> std::result::Result<Self, MatchmakingError> {
        serde_json::from_str(text).map_err(|e| MatchmakingError::InvalidClientMessage {
            reason: e.to_string(),
        })
    }
}

/// Events pushed from the server to connected clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    OnlineCount {
        count: usize,
    },
    QueueJoined,
    QueueLeft,
    MatchRequest {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "opponentName")]
        opponent_name: String,
    },
    MatchAccepted {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        players: Vec<String>,
        starter: String,
    },
    MatchRejected {
        #[serde(rename = "rejectedPlayerId")]
        rejected_player_id: PlayerId,
    },
    MatchTimeout {
        #[serde(rename = "timedOutPlayerId")]
        timed_out_player_id: PlayerId,
    },
}

impl ServerEvent {
    /// Wire name of the event, also used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::OnlineCount { .. } => "onlineCount",
            ServerEvent::QueueJoined => "queueJoined",
            ServerEvent::QueueLeft => "queueLeft",
            ServerEvent::MatchRequest { .. } => "matchRequest",
            ServerEvent::MatchAccepted { .. } => "matchAccepted",
            ServerEvent::MatchRejected { .. } => "matchRejected",
            ServerEvent::MatchTimeout { .. } => "matchTimeout",
        }
    }
}

/// How a pending match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchOutcome {
    Confirmed,
    Rejected,
    TimedOut,
}

impl MatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Confirmed => "confirmed",
            MatchOutcome::Rejected => "rejected",
            MatchOutcome::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A participant of a confirmed match as handed to the game-session collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlayer {
    pub player_id: PlayerId,
    pub display_name: String,
}

/// Request to open a game session for a confirmed match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSessionRequest {
    pub room_id: RoomId,
    /// Players in match order
    pub players: [SessionPlayer; 2],
    /// Player taking the first turn
    pub starter: PlayerId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"acceptMatch","roomId":"ab12cd34"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::AcceptMatch {
                room_id: "ab12cd34".to_string()
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"joinQueue"}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinQueue);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"acceptMatch"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
    }

    #[test]
    fn test_server_event_wire_format() {
        let event = ServerEvent::MatchRequest {
            room_id: "room1".to_string(),
            opponent_name: "Bob".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "matchRequest");
        assert_eq!(json["roomId"], "room1");
        assert_eq!(json["opponentName"], "Bob");

        let json = serde_json::to_value(ServerEvent::MatchTimeout {
            timed_out_player_id: "p2".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "matchTimeout");
        assert_eq!(json["timedOutPlayerId"], "p2");

        let json = serde_json::to_value(ServerEvent::QueueJoined).unwrap();
        assert_eq!(json, serde_json::json!({"type": "queueJoined"}));
    }

    #[test]
    fn test_client_message_parse_errors() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"leaveQueue"}"#).unwrap(),
            ClientMessage::LeaveQueue
        );
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(MatchmakingError::InvalidClientMessage { .. })
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"rejectMatch"}"#),
            Err(MatchmakingError::InvalidClientMessage { .. })
        ));
    }

    #[test]
    fn test_handshake_identity() {
        let full = Handshake {
            player_id: Some("p1".to_string()),
            display_name: Some(" Alice ".to_string()),
        };
        assert_eq!(
            full.identity().unwrap(),
            ("p1".to_string(), "Alice".to_string())
        );

        let missing_name = Handshake {
            player_id: Some("p1".to_string()),
            display_name: None,
        };
        assert!(matches!(
            missing_name.identity(),
            Err(MatchmakingError::InvalidHandshake { .. })
        ));

        let blank_id = Handshake {
            player_id: Some("   ".to_string()),
            display_name: Some("Alice".to_string()),
        };
        assert!(blank_id.identity().is_err());
        assert!(Handshake::default().identity().is_err());
    }

    #[test]
    fn test_handshake_keeps_player_id_verbatim() {
        let padded = Handshake {
            player_id: Some(" p1 ".to_string()),
            display_name: Some("Alice".to_string()),
        };
        let (player_id, _) = padded.identity().unwrap();
        assert_eq!(player_id, " p1 ");
    }
}
