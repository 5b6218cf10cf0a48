//! Player-facing WebSocket gateway
//!
//! Translates JSON frames into coordinator commands and forwards coordinator
//! events back to the client.

pub mod connection;
pub mod server;

pub use server::{GatewayConfig, GatewayServer, GatewayState};
