//! Accept-window timers
//!
//! Each player in a pending match gets one cancellable timer. When it fires,
//! an `AcceptTimeout` command is posted back to the coordinator task, which
//! re-checks the match before acting on it. Cancelling a timer both aborts
//! the sleeping task and flags the handle so a firing that is already in
//! flight is discarded.

use crate::matchmaking::actor::CoordinatorCommand;
use crate::types::{PlayerId, RoomId};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

/// Handle to a scheduled timer owned by a pending match
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    /// Cancel the timer. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Source of accept-window timers
pub trait TimerScheduler: Send {
    /// Schedule a timeout for `player_id` in `room_id` after `after`
    fn schedule(&self, room_id: RoomId, player_id: PlayerId, after: Duration) -> TimerHandle;
}

/// Timers backed by `tokio::time::sleep` that post back to the coordinator
pub struct TokioTimerScheduler {
    commands: mpsc::WeakUnboundedSender<CoordinatorCommand>,
}

impl TokioTimerScheduler {
    /// Holds only a weak sender so pending timers never keep the coordinator alive
    pub fn new(commands: &mpsc::UnboundedSender<CoordinatorCommand>) -> Self {
        Self {
            commands: commands.downgrade(),
        }
    }
}

impl TimerScheduler for TokioTimerScheduler {
    fn schedule(&self, room_id: RoomId, player_id: PlayerId, after: Duration) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let commands = self.commands.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if flag.load(Ordering::SeqCst) {
                return;
            }
            match commands.upgrade() {
                Some(tx) => {
                    let _ = tx.send(CoordinatorCommand::AcceptTimeout { room_id, player_id });
                }
                None => debug!(
                    "Coordinator gone, dropping timeout for {} in room {}",
                    player_id, room_id
                ),
            }
        });

        TimerHandle::new(cancelled, Some(task.abort_handle()))
    }
}

/// A timer recorded by `ManualTimerScheduler`
#[derive(Debug, Clone)]
pub struct ScheduledTimer {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub after: Duration,
    cancelled: Arc<AtomicBool>,
}

impl ScheduledTimer {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scheduler that never fires on its own; tests inspect what was scheduled
/// and drive timeouts by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualTimerScheduler {
    scheduled: Arc<Mutex<Vec<ScheduledTimer>>>,
}

impl ManualTimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every timer ever scheduled, cancelled ones included
    pub fn scheduled(&self) -> Vec<ScheduledTimer> {
        self.scheduled
            .lock()
            .map(|timers| timers.clone())
            .unwrap_or_default()
    }

    /// Timers that have not been cancelled
    pub fn active(&self) -> Vec<ScheduledTimer> {
        self.scheduled()
            .into_iter()
            .filter(|timer| !timer.is_cancelled())
            .collect()
    }

    /// Active timer for one player in one room, if any
    pub fn active_for(&self, room_id: &str, player_id: &str) -> Option<ScheduledTimer> {
        self.active()
            .into_iter()
            .find(|timer| timer.room_id == room_id && timer.player_id == player_id)
    }
}

impl TimerScheduler for ManualTimerScheduler {
    fn schedule(&self, room_id: RoomId, player_id: PlayerId, after: Duration) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        if let Ok(mut timers) = self.scheduled.lock() {
            timers.push(ScheduledTimer {
                room_id,
                player_id,
                after,
                cancelled: cancelled.clone(),
            });
        }
        TimerHandle::new(cancelled, None)
    }
}
