//! Matchmaking: queueing, pairing and mutual acceptance
//!
//! This module contains the FIFO queue, the pending-match record with its
//! accept timers, the coordinator state machine, and the task that drives it.

pub mod actor;
pub mod coordinator;
pub mod pending;
pub mod queue;
pub mod timer;

pub use actor::{CoordinatorActor, CoordinatorCommand, CoordinatorHandle};
pub use coordinator::{CoordinatorStats, MatchCoordinator};
pub use pending::PendingMatch;
pub use queue::MatchQueue;
pub use timer::{
    ManualTimerScheduler, ScheduledTimer, TimerHandle, TimerScheduler, TokioTimerScheduler,
};
