//! QuizBattle Matchmaker - pairing and mutual acceptance for quiz duels
//!
//! This crate tracks online players, queues them FIFO, pairs them two at a
//! time, and runs a two-phase accept/reject with per-player timeouts before
//! handing confirmed matches to the game-session collaborator. Clients talk
//! to it over a WebSocket gateway.

pub mod config;
pub mod error;
pub mod gateway;
pub mod matchmaking;
pub mod metrics;
pub mod notify;
pub mod presence;
pub mod service;
pub mod session;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use matchmaking::{CoordinatorActor, CoordinatorHandle, CoordinatorStats, MatchCoordinator};
pub use notify::Notifier;
pub use session::GameSessionProvider;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
