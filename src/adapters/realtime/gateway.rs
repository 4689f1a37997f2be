//! Connection Gateway - WebSocket upgrade and connection lifecycle.
//!
//! Route: `GET /ws?token=<jwt>`.
//!
//! The bearer token is verified before the upgrade completes; a connection
//! that fails verification is refused with 401 and never touches the
//! registry, so no events are observable to it. Once verified, the
//! connection's identity is fixed for its lifetime:
//!
//! 1. Register in the registry with an empty room set
//! 2. Auto-join the global lobby and announce presence
//! 3. Parse inbound frames into typed commands, dispatch, push typed
//!    events back on the per-connection channel
//! 4. On disconnect, release every membership exactly once and announce
//!    the user offline when their last connection is gone

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::domain::foundation::{
    ConnectionId, ConsultationSessionId, GatewayError, Identity, Timestamp,
};
use crate::domain::room::RoomKey;
use crate::ports::{ConsultationStore, TokenVerifier};

use super::messages::{ClientCommand, ServerEvent};
use super::registry::PresenceRegistry;

/// Shared state for the gateway, injected into every handler.
#[derive(Clone)]
pub struct GatewayState {
    pub verifier: Arc<dyn TokenVerifier>,
    pub registry: Arc<PresenceRegistry>,
    pub consultations: Arc<dyn ConsultationStore>,
}

impl GatewayState {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        registry: Arc<PresenceRegistry>,
        consultations: Arc<dyn ConsultationStore>,
    ) -> Self {
        Self {
            verifier,
            registry,
            consultations,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Bearer credential; connections without one are refused.
    token: Option<String>,
}

/// Handles the WebSocket upgrade, verifying identity first.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<GatewayState>,
) -> Response {
    let Some(token) = params.token else {
        return (StatusCode::UNAUTHORIZED, "Missing token").into_response();
    };

    let identity = match state.verifier.verify(&token).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::debug!(error = %err, "Connection refused: token verification failed");
            return (StatusCode::UNAUTHORIZED, err.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, identity, state))
}

/// Runs for the lifetime of one verified connection.
async fn handle_socket(socket: WebSocket, identity: Identity, state: GatewayState) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let connection_id = state.registry.register(identity.clone(), event_tx).await;

    tracing::debug!(
        connection_id = %connection_id,
        user_id = %identity.user_id,
        role = ?identity.role,
        "Connection established"
    );

    // Every connection sits in the lobby; presence is announced there.
    if state
        .registry
        .join_key(&connection_id, RoomKey::Global)
        .await
        .is_ok()
    {
        state
            .registry
            .broadcast(
                &RoomKey::Global,
                ServerEvent::UserOnline {
                    user_id: identity.user_id.to_string(),
                },
                Some(&connection_id),
            )
            .await;
    }

    let (mut sink, mut stream) = socket.split();

    // Forward the per-connection channel to the socket. Channel order is
    // delivery order for this client.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!(error = %err, "Outbound event serialization failed");
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_identity = identity.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    let command = match serde_json::from_str::<ClientCommand>(&text) {
                        Ok(command) => command,
                        Err(_) => {
                            recv_state
                                .registry
                                .send_to_connection(
                                    &connection_id,
                                    ServerEvent::error("Unrecognized command"),
                                )
                                .await;
                            continue;
                        }
                    };
                    if let Err(err) =
                        handle_command(&recv_state, &connection_id, &recv_identity, command).await
                    {
                        recv_state
                            .registry
                            .send_to_connection(
                                &connection_id,
                                ServerEvent::error(err.client_message()),
                            )
                            .await;
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %connection_id, "Client sent close frame");
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Transport-level liveness, handled by axum.
                }
                Ok(Message::Binary(_)) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        "Binary frames are not part of the protocol"
                    );
                }
                Err(err) => {
                    tracing::debug!(connection_id = %connection_id, error = %err, "Receive error");
                    break;
                }
            }
        }
    });

    // Whichever task stops first, the connection is over.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    finish_connection(&state, connection_id).await;
}

/// Releases a connection's state and fires offline presence.
///
/// `unregister` yields `Some` exactly once per connection, so these side
/// effects run once even when send and receive halves race to report the
/// disconnect.
async fn finish_connection(state: &GatewayState, connection_id: ConnectionId) {
    let Some(summary) = state.registry.unregister(&connection_id).await else {
        return;
    };

    let user_id = summary.identity.user_id.to_string();
    for key in &summary.rooms {
        state
            .registry
            .broadcast(
                key,
                ServerEvent::UserLeft {
                    user_id: user_id.clone(),
                    room_id: wire_room_id(key),
                },
                None,
            )
            .await;
    }

    if summary.last_user_connection {
        state
            .registry
            .broadcast_all(
                ServerEvent::UserOffline {
                    user_id: user_id.clone(),
                    last_seen: Timestamp::now(),
                },
                None,
            )
            .await;
    }

    tracing::debug!(
        connection_id = %connection_id,
        user_id = %user_id,
        rooms_released = summary.rooms.len(),
        "Connection closed"
    );
}

/// The room identifier clients see in events.
fn wire_room_id(key: &RoomKey) -> String {
    match key {
        RoomKey::Community { room_id } => room_id.to_string(),
        other => other.to_string(),
    }
}

/// Dispatches one inbound command. Errors become `error` events; the
/// connection stays open.
pub(crate) async fn handle_command(
    state: &GatewayState,
    connection_id: &ConnectionId,
    identity: &Identity,
    command: ClientCommand,
) -> Result<(), GatewayError> {
    match command {
        ClientCommand::JoinRoom { room_id } => {
            let joined = state.registry.join_room(connection_id, &room_id).await?;
            state
                .registry
                .send_to_connection(
                    connection_id,
                    ServerEvent::RoomJoined {
                        room_id: joined.room_id.clone(),
                        room_name: joined.room_name.clone(),
                    },
                )
                .await;
            if joined.newly_joined {
                state
                    .registry
                    .broadcast(
                        &joined.key,
                        ServerEvent::UserJoined {
                            user_id: identity.user_id.to_string(),
                            user_name: identity.display_name_or_email().to_string(),
                            room_id: joined.room_id,
                        },
                        Some(connection_id),
                    )
                    .await;
            }
            Ok(())
        }
        ClientCommand::LeaveRoom { room_id } => {
            let key = state.registry.resolve_key(&room_id).await?;
            state.registry.leave_key(connection_id, &key).await;
            state
                .registry
                .broadcast(
                    &key,
                    ServerEvent::UserLeft {
                        user_id: identity.user_id.to_string(),
                        room_id: wire_room_id(&key),
                    },
                    None,
                )
                .await;
            Ok(())
        }
        ClientCommand::Typing { room_id } => {
            let key = state.registry.resolve_key(&room_id).await?;
            if !state.registry.is_member(connection_id, &key).await {
                return Err(GatewayError::AccessDenied);
            }
            state
                .registry
                .broadcast(
                    &key,
                    ServerEvent::Typing {
                        room_id: wire_room_id(&key),
                        user_id: identity.user_id.to_string(),
                        user_name: identity.display_name_or_email().to_string(),
                    },
                    Some(connection_id),
                )
                .await;
            Ok(())
        }
        ClientCommand::StopTyping { room_id } => {
            let key = state.registry.resolve_key(&room_id).await?;
            if !state.registry.is_member(connection_id, &key).await {
                return Err(GatewayError::AccessDenied);
            }
            state
                .registry
                .broadcast(
                    &key,
                    ServerEvent::StopTyping {
                        room_id: wire_room_id(&key),
                        user_id: identity.user_id.to_string(),
                    },
                    Some(connection_id),
                )
                .await;
            Ok(())
        }
        ClientCommand::JoinConsultation { session_id } => {
            let session_id = parse_session_id(&session_id)?;
            let session = state
                .consultations
                .find_session(&session_id)
                .await
                .map_err(GatewayError::from)?
                .ok_or(GatewayError::NotFound("Session"))?;
            session.authorize_access(identity)?;

            let key = RoomKey::session(session_id);
            let newly_joined = state.registry.join_key(connection_id, key.clone()).await?;
            state
                .registry
                .send_to_connection(
                    connection_id,
                    ServerEvent::ConsultationRoomJoined {
                        session_id: session_id.to_string(),
                    },
                )
                .await;
            if newly_joined {
                state
                    .registry
                    .broadcast(
                        &key,
                        ServerEvent::UserJoined {
                            user_id: identity.user_id.to_string(),
                            user_name: identity.display_name_or_email().to_string(),
                            room_id: wire_room_id(&key),
                        },
                        Some(connection_id),
                    )
                    .await;
            }
            Ok(())
        }
        ClientCommand::LeaveConsultation { session_id } => {
            let session_id = parse_session_id(&session_id)?;
            let key = RoomKey::session(session_id);
            state.registry.leave_key(connection_id, &key).await;
            state
                .registry
                .broadcast(
                    &key,
                    ServerEvent::UserLeft {
                        user_id: identity.user_id.to_string(),
                        room_id: wire_room_id(&key),
                    },
                    None,
                )
                .await;
            Ok(())
        }
        ClientCommand::ConsultationTyping { session_id } => {
            let session_id = parse_session_id(&session_id)?;
            let key = RoomKey::session(session_id);
            if !state.registry.is_member(connection_id, &key).await {
                return Err(GatewayError::AccessDenied);
            }
            state
                .registry
                .broadcast(
                    &key,
                    ServerEvent::Typing {
                        room_id: wire_room_id(&key),
                        user_id: identity.user_id.to_string(),
                        user_name: identity.display_name_or_email().to_string(),
                    },
                    Some(connection_id),
                )
                .await;
            Ok(())
        }
        ClientCommand::UserOnline {} => {
            state
                .registry
                .broadcast(
                    &RoomKey::Global,
                    ServerEvent::UserOnline {
                        user_id: identity.user_id.to_string(),
                    },
                    Some(connection_id),
                )
                .await;
            Ok(())
        }
    }
}

fn parse_session_id(raw: &str) -> Result<ConsultationSessionId, GatewayError> {
    raw.parse().map_err(|_| GatewayError::NotFound("Session"))
}

/// Router exposing the gateway endpoint.
pub fn gateway_router() -> Router<GatewayState> {
    Router::new().route("/ws", get(ws_handler))
}
