//! Coordinator task
//!
//! The coordinator runs inside a single tokio task and is driven entirely by
//! commands on one unbounded channel. Connections, client messages, timer
//! firings and stats queries are all serialized through it, so coordinator
//! state is never shared or locked.

use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::matchmaking::coordinator::{CoordinatorStats, MatchCoordinator};
use crate::matchmaking::timer::TokioTimerScheduler;
use crate::metrics::MetricsCollector;
use crate::notify::Notifier;
use crate::presence::ConnectionHandle;
use crate::session::GameSessionProvider;
use crate::types::{ClientMessage, ConnectionId, PlayerId, RoomId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Everything the coordinator task can be asked to do
#[derive(Debug)]
pub enum CoordinatorCommand {
    Connect {
        player_id: PlayerId,
        display_name: String,
        handle: ConnectionHandle,
    },
    Disconnect {
        player_id: PlayerId,
        conn_id: ConnectionId,
    },
    JoinQueue {
        player_id: PlayerId,
    },
    LeaveQueue {
        player_id: PlayerId,
    },
    AcceptMatch {
        player_id: PlayerId,
        room_id: RoomId,
    },
    RejectMatch {
        player_id: PlayerId,
        room_id: RoomId,
    },
    AcceptTimeout {
        room_id: RoomId,
        player_id: PlayerId,
    },
    GetStats {
        reply: oneshot::Sender<CoordinatorStats>,
    },
    Shutdown,
}

/// Cloneable sender side used by the gateway and the service
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<CoordinatorCommand>,
}

impl CoordinatorHandle {
    pub fn new(tx: mpsc::UnboundedSender<CoordinatorCommand>) -> Self {
        Self { tx }
    }

    fn send(&self, command: CoordinatorCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| {
            MatchmakingError::CoordinatorUnavailable {
                message: "coordinator task has stopped".to_string(),
            }
            .into()
        })
    }

    pub fn connect(
        &self,
        player_id: PlayerId,
        display_name: String,
        handle: ConnectionHandle,
    ) -> Result<()> {
        self.send(CoordinatorCommand::Connect {
            player_id,
            display_name,
            handle,
        })
    }

    pub fn disconnect(&self, player_id: PlayerId, conn_id: ConnectionId) -> Result<()> {
        self.send(CoordinatorCommand::Disconnect { player_id, conn_id })
    }

    pub fn join_queue(&self, player_id: PlayerId) -> Result<()> {
        self.send(CoordinatorCommand::JoinQueue { player_id })
    }

    pub fn leave_queue(&self, player_id: PlayerId) -> Result<()> {
        self.send(CoordinatorCommand::LeaveQueue { player_id })
    }

    pub fn accept_match(&self, player_id: PlayerId, room_id: RoomId) -> Result<()> {
        self.send(CoordinatorCommand::AcceptMatch { player_id, room_id })
    }

    pub fn reject_match(&self, player_id: PlayerId, room_id: RoomId) -> Result<()> {
        self.send(CoordinatorCommand::RejectMatch { player_id, room_id })
    }

    /// Forward a client frame on behalf of `player_id`.
    /// `Disconnect` frames are handled by the transport closing the socket.
    pub fn dispatch(&self, player_id: &str, message: ClientMessage) -> Result<()> {
        let player_id = player_id.to_string();
        match message {
            ClientMessage::JoinQueue => self.join_queue(player_id),
            ClientMessage::LeaveQueue => self.leave_queue(player_id),
            ClientMessage::AcceptMatch { room_id } => self.accept_match(player_id, room_id),
            ClientMessage::RejectMatch { room_id } => self.reject_match(player_id, room_id),
            ClientMessage::Disconnect => Ok(()),
        }
    }

    /// Ask the coordinator for a stats snapshot
    pub async fn stats(&self) -> Result<CoordinatorStats> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::GetStats { reply })?;
        rx.await.map_err(|_| {
            MatchmakingError::CoordinatorUnavailable {
                message: "coordinator dropped the stats request".to_string(),
            }
            .into()
        })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(CoordinatorCommand::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Owns the coordinator and the receiving end of its command channel
pub struct CoordinatorActor {
    coordinator: MatchCoordinator,
    rx: mpsc::UnboundedReceiver<CoordinatorCommand>,
}

impl CoordinatorActor {
    pub fn new(
        coordinator: MatchCoordinator,
        rx: mpsc::UnboundedReceiver<CoordinatorCommand>,
    ) -> Self {
        Self { coordinator, rx }
    }

    /// Build a coordinator with tokio timers and spawn its task
    pub fn spawn(
        settings: MatchmakingSettings,
        notifier: Arc<dyn Notifier>,
        sessions: Arc<dyn GameSessionProvider>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timers = TokioTimerScheduler::new(&tx);

        let mut coordinator =
            MatchCoordinator::new(settings, notifier, sessions, Box::new(timers));
        if let Some(metrics) = metrics {
            coordinator = coordinator.with_metrics(metrics);
        }

        let actor = Self::new(coordinator, rx);
        let task = tokio::spawn(actor.run());
        (CoordinatorHandle::new(tx), task)
    }

    /// Process commands until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!("Coordinator task started");

        while let Some(command) = self.rx.recv().await {
            if !self.handle_command(command) {
                break;
            }
            self.coordinator.publish_gauges();
        }

        let stats = self.coordinator.stats();
        info!(
            "Coordinator task stopped ({} pending matches dropped, {} confirmed in total)",
            stats.pending_matches, stats.matches_confirmed
        );
    }

    /// Returns false when the task should stop
    fn handle_command(&mut self, command: CoordinatorCommand) -> bool {
        match command {
            CoordinatorCommand::Connect {
                player_id,
                display_name,
                handle,
            } => self.coordinator.connect(player_id, display_name, handle),
            CoordinatorCommand::Disconnect { player_id, conn_id } => {
                self.coordinator.disconnect(&player_id, conn_id)
            }
            CoordinatorCommand::JoinQueue { player_id } => self.coordinator.join_queue(&player_id),
            CoordinatorCommand::LeaveQueue { player_id } => {
                self.coordinator.leave_queue(&player_id)
            }
            CoordinatorCommand::AcceptMatch { player_id, room_id } => {
                self.coordinator.accept(&player_id, &room_id)
            }
            CoordinatorCommand::RejectMatch { player_id, room_id } => {
                self.coordinator.reject(&player_id, &room_id)
            }
            CoordinatorCommand::AcceptTimeout { room_id, player_id } => {
                self.coordinator.handle_timeout(&room_id, &player_id)
            }
            CoordinatorCommand::GetStats { reply } => {
                if reply.send(self.coordinator.stats()).is_err() {
                    debug!("Stats requester went away");
                }
            }
            CoordinatorCommand::Shutdown => {
                info!("Coordinator shutdown requested");
                return false;
            }
        }
        true
    }
}
