//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Invalid handshake: {reason}")]
    InvalidHandshake { reason: String },

    #[error("Invalid client message: {reason}")]
    InvalidClientMessage { reason: String },

    #[error("Game session creation failed for room {room_id}: {reason}")]
    SessionCreationFailed { room_id: String, reason: String },

    #[error("Coordinator unavailable: {message}")]
    CoordinatorUnavailable { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
