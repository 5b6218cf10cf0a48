//! Player notifications

pub mod notifier;

pub use notifier::{ChannelNotifier, MockNotifier, Notifier};
