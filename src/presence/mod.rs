//! Online presence tracking

pub mod registry;

pub use registry::{ConnectionHandle, PresenceEntry, PresenceRegistry};
