//! Game session hand-off for confirmed matches

pub mod provider;

pub use provider::{GameSessionProvider, InMemorySessionStore};

#[cfg(test)]
pub use provider::MockGameSessionProvider;
