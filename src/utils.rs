//! Utility functions for the matchmaking service

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// Generate a short random room token of the given length
pub fn generate_room_id<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Generate a new unique connection ID
pub fn generate_connection_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
