//! Per-connection WebSocket handling
//!
//! A connection whose handshake carries both a player id and a display name
//! is registered with the coordinator and relays frames in both directions
//! until either side goes away. Anything else is accepted but inert: frames
//! are read and discarded until the client closes.

use crate::gateway::server::GatewayState;
use crate::matchmaking::CoordinatorHandle;
use crate::presence::ConnectionHandle;
use crate::types::{ClientMessage, Handshake, PlayerId, ServerEvent};
use axum::{
    extract::{
        rejection::QueryRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

enum LoopControl {
    Continue,
    Disconnect,
}

/// `GET /ws?playerId=..&displayName=..`
///
/// A query string that does not decode still upgrades; the connection is
/// then inert.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    query: Result<Query<Handshake>, QueryRejection>,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    let handshake = match query {
        Ok(Query(handshake)) => handshake,
        Err(rejection) => {
            warn!("Unreadable handshake query: {}", rejection.body_text());
            Handshake::default()
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, handshake, state))
}

async fn handle_socket(socket: WebSocket, handshake: Handshake, state: GatewayState) {
    match handshake.identity() {
        Ok((player_id, display_name)) => {
            if let Some(metrics) = &state.metrics {
                metrics.record_connection(true);
            }
            run_player_connection(socket, player_id, display_name, &state.coordinator).await;
        }
        Err(e) => {
            warn!(
                "{} (playerId: {:?}, displayName: {:?}), keeping the connection inert",
                e, handshake.player_id, handshake.display_name
            );
            if let Some(metrics) = &state.metrics {
                metrics.record_connection(false);
            }
            drain_inert(socket).await;
        }
    }
}

async fn drain_inert(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Close(_) = message {
            break;
        }
    }
    debug!("Inert connection closed");
}

async fn run_player_connection(
    socket: WebSocket,
    player_id: PlayerId,
    display_name: String,
    coordinator: &CoordinatorHandle,
) {
    let (handle, mut outbound) = ConnectionHandle::new();
    let conn_id = handle.conn_id();

    if let Err(e) = coordinator.connect(player_id.clone(), display_name, handle) {
        warn!("Could not register player {}: {}", player_id, e);
        return;
    }

    let (mut sender, mut receiver) = socket.split();

    loop {
        let control = tokio::select! {
            incoming = receiver.next() => handle_incoming(incoming, &player_id, coordinator),
            event = outbound.recv() => match event {
                Some(event) => forward_event(&mut sender, &event).await,
                // Replaced by a newer connection, or the coordinator stopped
                None => LoopControl::Disconnect,
            },
        };

        if let LoopControl::Disconnect = control {
            break;
        }
    }

    if let Err(e) = sender.close().await {
        debug!("Error closing socket for {}: {}", player_id, e);
    }
    if let Err(e) = coordinator.disconnect(player_id.clone(), conn_id) {
        debug!("Disconnect for {} not delivered: {}", player_id, e);
    }
    info!("Connection {} for player {} closed", conn_id, player_id);
}

fn handle_incoming(
    incoming: Option<Result<Message, axum::Error>>,
    player_id: &str,
    coordinator: &CoordinatorHandle,
) -> LoopControl {
    match incoming {
        Some(Ok(Message::Text(text))) => match ClientMessage::parse(text.as_str()) {
            Ok(ClientMessage::Disconnect) => LoopControl::Disconnect,
            Ok(message) => match coordinator.dispatch(player_id, message) {
                Ok(()) => LoopControl::Continue,
                Err(e) => {
                    warn!("Dropping connection for {}: {}", player_id, e);
                    LoopControl::Disconnect
                }
            },
            Err(e) => {
                warn!("Ignoring frame from {}: {}", player_id, e);
                LoopControl::Continue
            }
        },
        Some(Ok(Message::Close(_))) => LoopControl::Disconnect,
        Some(Ok(_)) => LoopControl::Continue,
        Some(Err(e)) => {
            debug!("WebSocket error for {}: {}", player_id, e);
            LoopControl::Disconnect
        }
        None => LoopControl::Disconnect,
    }
}

async fn forward_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> LoopControl {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize {}: {}", event.kind(), e);
            return LoopControl::Continue;
        }
    };

    match sender.send(Message::Text(text.into())).await {
        Ok(()) => LoopControl::Continue,
        Err(_) => LoopControl::Disconnect,
    }
}
