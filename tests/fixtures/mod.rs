//! Test fixtures and helpers for integration testing
#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use quizbattle_matchmaker::config::MatchmakingSettings;
use quizbattle_matchmaker::error::{MatchmakingError, Result};
use quizbattle_matchmaker::gateway::{GatewayConfig, GatewayServer};
use quizbattle_matchmaker::matchmaking::{
    CoordinatorActor, CoordinatorHandle, ManualTimerScheduler, MatchCoordinator,
};
use quizbattle_matchmaker::notify::{ChannelNotifier, MockNotifier};
use quizbattle_matchmaker::presence::ConnectionHandle;
use quizbattle_matchmaker::session::{GameSessionProvider, InMemorySessionStore};
use quizbattle_matchmaker::types::{ConnectionId, GameSessionRequest, RoomId, ServerEvent};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Session provider that refuses every request
#[derive(Debug, Default)]
pub struct FailingSessionProvider {
    attempts: AtomicUsize,
}

impl FailingSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl GameSessionProvider for FailingSessionProvider {
    fn create_session(&self, request: GameSessionRequest) -> Result<RoomId> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MatchmakingError::SessionCreationFailed {
            room_id: request.room_id,
            reason: "game server unavailable".to_string(),
        }
        .into())
    }
}

/// A coordinator wired to recording collaborators and manual timers
pub struct TestSystem {
    pub coordinator: MatchCoordinator,
    pub notifier: Arc<MockNotifier>,
    pub timers: ManualTimerScheduler,
    pub sessions: Arc<InMemorySessionStore>,
    connections: HashMap<String, ConnectionId>,
    receivers: Vec<UnboundedReceiver<ServerEvent>>,
}

impl TestSystem {
    pub fn new() -> Self {
        Self::with_settings(MatchmakingSettings::default())
    }

    pub fn with_settings(settings: MatchmakingSettings) -> Self {
        Self::build(settings, StdRng::seed_from_u64(2024))
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::build(MatchmakingSettings::default(), StdRng::seed_from_u64(seed))
    }

    fn build(settings: MatchmakingSettings, rng: StdRng) -> Self {
        let notifier = Arc::new(MockNotifier::new());
        let timers = ManualTimerScheduler::new();
        let sessions = Arc::new(InMemorySessionStore::new());
        let coordinator = MatchCoordinator::new(
            settings,
            notifier.clone(),
            sessions.clone(),
            Box::new(timers.clone()),
        )
        .with_rng(rng);

        Self {
            coordinator,
            notifier,
            timers,
            sessions,
            connections: HashMap::new(),
            receivers: Vec::new(),
        }
    }

    pub fn connect(&mut self, player_id: &str, display_name: &str) -> ConnectionId {
        let (handle, rx) = ConnectionHandle::new();
        let conn_id = handle.conn_id();
        self.coordinator
            .connect(player_id.to_string(), display_name.to_string(), handle);
        self.connections.insert(player_id.to_string(), conn_id);
        self.receivers.push(rx);
        conn_id
    }

    pub fn disconnect(&mut self, player_id: &str) {
        if let Some(conn_id) = self.connections.get(player_id).copied() {
            self.coordinator.disconnect(player_id, conn_id);
        }
    }

    pub fn connect_and_queue(&mut self, player_id: &str, display_name: &str) {
        self.connect(player_id, display_name);
        self.coordinator.join_queue(player_id);
    }

    pub fn room_of(&self, player_id: &str) -> RoomId {
        self.coordinator
            .pending_room_of(player_id)
            .cloned()
            .unwrap_or_else(|| panic!("{} should be in a pending match", player_id))
    }

    /// Fire every still-active timer for `room_id`
    pub fn expire_room(&mut self, room_id: &str) {
        for timer in self.timers.active() {
            if timer.room_id == room_id {
                self.coordinator
                    .handle_timeout(&timer.room_id, &timer.player_id);
            }
        }
    }

    pub fn last_event_for(&self, player_id: &str) -> Option<ServerEvent> {
        self.notifier.events_for(player_id).last().cloned()
    }
}

pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running coordinator and gateway bound to an ephemeral port
pub struct TestGateway {
    pub addr: SocketAddr,
    pub coordinator: CoordinatorHandle,
    pub server: Arc<GatewayServer>,
}

impl TestGateway {
    pub async fn start(accept_timeout_seconds: u64) -> Self {
        let settings = MatchmakingSettings {
            accept_timeout_seconds,
            ..MatchmakingSettings::default()
        };
        let (coordinator, _task) = CoordinatorActor::spawn(
            settings,
            Arc::new(ChannelNotifier::new()),
            Arc::new(InMemorySessionStore::new()),
            None,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind gateway listener");
        let addr = listener.local_addr().expect("listener address");

        let server = Arc::new(GatewayServer::new(
            GatewayConfig {
                host: "127.0.0.1".to_string(),
                port: addr.port(),
            },
            coordinator.clone(),
        ));
        let serving = server.clone();
        tokio::spawn(async move {
            let _ = serving.serve(listener).await;
        });

        Self {
            addr,
            coordinator,
            server,
        }
    }

    pub async fn connect(&self, query: &str) -> ClientSocket {
        let url = format!("ws://{}/ws?{}", self.addr, query);
        let (socket, _) = connect_async(url).await.expect("websocket handshake");
        socket
    }

    pub async fn connect_player(&self, player_id: &str, display_name: &str) -> ClientSocket {
        self.connect(&format!(
            "playerId={}&displayName={}",
            player_id, display_name
        ))
        .await
    }
}

pub async fn send_json(socket: &mut ClientSocket, value: serde_json::Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

/// Next JSON event from the server, skipping non-text frames
pub async fn next_event(socket: &mut ClientSocket) -> serde_json::Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("valid JSON event");
        }
    }
}

/// Skip events until one of the given type arrives
pub async fn next_event_of_type(socket: &mut ClientSocket, kind: &str) -> serde_json::Value {
    loop {
        let event = next_event(socket).await;
        if event["type"] == kind {
            return event;
        }
    }
}

/// Poll coordinator stats until `check` passes
pub async fn wait_for_stats<F>(coordinator: &CoordinatorHandle, check: F)
where
    F: Fn(&quizbattle_matchmaker::CoordinatorStats) -> bool,
{
    for _ in 0..100 {
        let stats = coordinator.stats().await.expect("coordinator stats");
        if check(&stats) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("coordinator never reached the expected state");
}
