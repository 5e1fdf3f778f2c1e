//! WebSocket streaming transport.

#![allow(missing_docs)]

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use schoolhub_core::Role;

use crate::hub::{ConnectionHub, RoomEvent};

/// Client-to-server message.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Authenticate the connection.
    #[serde(rename_all = "camelCase")]
    Authenticate {
        user_id: String,
        role: String,
        token: String,
    },
    /// Join a named room.
    JoinRoom { room: String },
    /// Leave a named room.
    LeaveRoom { room: String },
}

/// Server-to-client message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Authentication succeeded.
    #[serde(rename_all = "camelCase")]
    Authenticated { user_id: String, role: String },
    /// A request failed; the connection stays open.
    Error { message: String },
    /// An event emitted to a room this connection belongs to.
    Event { room: String, payload: serde_json::Value },
}

impl From<RoomEvent> for ServerMessage {
    fn from(event: RoomEvent) -> Self {
        Self::Event {
            room: event.room,
            payload: event.payload,
        }
    }
}

/// WebSocket handler for the streaming endpoint.
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    State(hub): State<Arc<ConnectionHub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handle one WebSocket connection for its whole lifetime.
async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHub>) {
    let (mut sender, mut receiver) = socket.split();
    let (session_id, mut events) = hub.connect().await;

    info!(session_id = %session_id, "Streaming connection established");

    loop {
        tokio::select! {
            // Inbound frames from the client.
            Some(msg) = receiver.next() => {
                match msg {
                    Ok(Message::Text(text)) => {
                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handle_client_message(&hub, session_id, client_msg).await
                            }
                            Err(e) => {
                                warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                                Some(ServerMessage::Error {
                                    message: format!("malformed message: {e}"),
                                })
                            }
                        };
                        if let Some(response) = response {
                            match serde_json::to_string(&response) {
                                Ok(json) => {
                                    if sender.send(Message::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    warn!(session_id = %session_id, error = %e, "Failed to serialize server message");
                                }
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!(session_id = %session_id, "Client closed connection");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            // Outbound events emitted by the hub.
            Some(event) = events.recv() => {
                match serde_json::to_string(&ServerMessage::from(event)) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to serialize room event");
                    }
                }
            }

            else => break,
        }
    }

    hub.disconnect(session_id).await;
    info!(session_id = %session_id, "Streaming connection closed");
}

/// Apply a client message to the hub, mapping failures to error frames.
async fn handle_client_message(
    hub: &ConnectionHub,
    session_id: Uuid,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Authenticate {
            user_id,
            role,
            token,
        } => {
            let Some(role) = Role::parse(&role) else {
                return Some(ServerMessage::Error {
                    message: format!("unknown role: {role}"),
                });
            };
            match hub.authenticate(session_id, role, &user_id, &token).await {
                Ok(()) => Some(ServerMessage::Authenticated {
                    user_id,
                    role: role.to_string(),
                }),
                // The session stays anonymous; the connection is not closed.
                Err(e) => Some(ServerMessage::Error {
                    message: e.to_string(),
                }),
            }
        }
        ClientMessage::JoinRoom { room } => match hub.join_room(session_id, &room).await {
            Ok(()) => None,
            Err(e) => Some(ServerMessage::Error {
                message: e.to_string(),
            }),
        },
        ClientMessage::LeaveRoom { room } => {
            hub.leave_room(session_id, &room).await;
            None
        }
    }
}
