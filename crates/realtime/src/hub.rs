//! Live connection hub.
//!
//! Tracks every open connection, its authenticated identity and its joined
//! rooms, and emits payloads to rooms, users or everyone. State machine per
//! connection: anonymous, then authenticated after a successful handshake,
//! then closed on disconnect; there is no transition back from closed.
//!
//! The index is in-memory and private to one process instance. Realtime
//! delivery is only guaranteed within this process's connections;
//! a multi-instance deployment needs an external pub/sub backplane.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use schoolhub_common::{AppError, AppResult};
use schoolhub_core::Role;

/// An event delivered to a connection's outbound queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomEvent {
    /// The room this event was emitted to.
    pub room: String,
    /// The event payload.
    pub payload: Value,
}

/// The room owned by one user identity.
#[must_use]
pub fn identity_room(role: Role, user_id: &str) -> String {
    format!("{role}:{user_id}")
}

/// Whether a room name is identity-shaped and therefore join-restricted.
fn is_identity_room(room: &str) -> bool {
    room.starts_with("teacher:") || room.starts_with("student:")
}

struct Session {
    sender: mpsc::Sender<RoomEvent>,
    identity: Option<(Role, String)>,
    rooms: HashSet<String>,
    connected_at: DateTime<Utc>,
}

#[derive(Default)]
struct HubState {
    sessions: HashMap<Uuid, Session>,
    rooms: HashMap<String, HashSet<Uuid>>,
}

impl HubState {
    fn join(&mut self, session_id: Uuid, room: &str) {
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.rooms.insert(room.to_string());
            self.rooms.entry(room.to_string()).or_default().insert(session_id);
        }
    }

    fn leave(&mut self, session_id: Uuid, room: &str) {
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.rooms.remove(room);
        }
        let now_empty = self.rooms.get_mut(room).is_some_and(|members| {
            members.remove(&session_id);
            members.is_empty()
        });
        if now_empty {
            self.rooms.remove(room);
        }
    }
}

/// Live connection hub.
///
/// Cheap to share behind an `Arc`; created once at process start.
pub struct ConnectionHub {
    state: RwLock<HubState>,
    send_buffer: usize,
}

impl ConnectionHub {
    /// Create a hub whose per-connection outbound queues hold `send_buffer`
    /// pending events before further emits to that connection are dropped.
    #[must_use]
    pub fn new(send_buffer: usize) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            send_buffer: send_buffer.max(1),
        }
    }

    /// Register a new connection in the anonymous state.
    ///
    /// Returns the session ID and the receiving end of the connection's
    /// outbound queue, to be drained by the transport task.
    pub async fn connect(&self) -> (Uuid, mpsc::Receiver<RoomEvent>) {
        let session_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.send_buffer);

        let mut state = self.state.write().await;
        state.sessions.insert(
            session_id,
            Session {
                sender: tx,
                identity: None,
                rooms: HashSet::new(),
                connected_at: Utc::now(),
            },
        );
        tracing::debug!(session_id = %session_id, "Connection registered");
        (session_id, rx)
    }

    /// Authenticate a connection.
    ///
    /// On success the session transitions to the authenticated state and
    /// joins its identity room. On failure the session stays anonymous;
    /// an auth failure alone never closes the connection.
    pub async fn authenticate(
        &self,
        session_id: Uuid,
        role: Role,
        user_id: &str,
        credential: &str,
    ) -> AppResult<()> {
        if user_id.is_empty() {
            return Err(AppError::Validation("userId is required".to_string()));
        }
        if credential.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let room = identity_room(role, user_id);
        let mut state = self.state.write().await;
        let Some(session) = state.sessions.get_mut(&session_id) else {
            return Err(AppError::NotFound("session is closed".to_string()));
        };
        let previous = session.identity.replace((role, user_id.to_string()));
        state.join(session_id, &room);

        // A re-authenticated session stops receiving for its old identity.
        if let Some((old_role, old_id)) = previous {
            let old_room = identity_room(old_role, &old_id);
            if old_room != room {
                state.leave(session_id, &old_room);
            }
        }

        tracing::info!(session_id = %session_id, user_id = %user_id, role = %role, "Connection authenticated");
        Ok(())
    }

    /// Join a named room.
    ///
    /// Identity-shaped rooms (`teacher:*`, `student:*`) can only be joined
    /// by the session that owns the identity; other rooms are open.
    pub async fn join_room(&self, session_id: Uuid, room: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        let Some(session) = state.sessions.get(&session_id) else {
            return Err(AppError::NotFound("session is closed".to_string()));
        };

        if is_identity_room(room) {
            let own_room = session
                .identity
                .as_ref()
                .map(|(role, user_id)| identity_room(*role, user_id));
            if own_room.as_deref() != Some(room) {
                return Err(AppError::Forbidden(format!(
                    "cannot join another user's room: {room}"
                )));
            }
        }

        state.join(session_id, room);
        tracing::debug!(session_id = %session_id, room = %room, "Joined room");
        Ok(())
    }

    /// Leave a named room. A no-op when the session is not a member.
    pub async fn leave_room(&self, session_id: Uuid, room: &str) {
        let mut state = self.state.write().await;
        state.leave(session_id, room);
    }

    /// Discard a connection and all its room memberships. Idempotent.
    pub async fn disconnect(&self, session_id: Uuid) {
        let mut state = self.state.write().await;
        if let Some(session) = state.sessions.remove(&session_id) {
            for room in &session.rooms {
                let now_empty = state.rooms.get_mut(room).is_some_and(|members| {
                    members.remove(&session_id);
                    members.is_empty()
                });
                if now_empty {
                    state.rooms.remove(room);
                }
            }
            let connected_for = Utc::now() - session.connected_at;
            tracing::debug!(
                session_id = %session_id,
                connected_secs = connected_for.num_seconds(),
                "Connection discarded"
            );
        }
    }

    /// Emit a payload to every connection in a room.
    ///
    /// Fire-and-forget: an empty room or a full outbound queue results in
    /// silent non-delivery.
    pub async fn broadcast_to_room(&self, room: &str, payload: Value) {
        let state = self.state.read().await;
        let Some(members) = state.rooms.get(room) else {
            return;
        };
        for session_id in members {
            if let Some(session) = state.sessions.get(session_id) {
                Self::emit(session, session_id, room, payload.clone());
            }
        }
    }

    /// Emit a payload to every live connection.
    pub async fn broadcast_to_all(&self, payload: Value) {
        let state = self.state.read().await;
        for (session_id, session) in &state.sessions {
            Self::emit(session, session_id, "*", payload.clone());
        }
    }

    /// Emit a payload to one user's identity room.
    pub async fn send_to_user(&self, role: Role, user_id: &str, payload: Value) {
        self.broadcast_to_room(&identity_room(role, user_id), payload)
            .await;
    }

    /// Emit a payload to each user in the list, sequentially.
    pub async fn send_to_users(&self, role: Role, user_ids: &[String], payload: Value) {
        for user_id in user_ids {
            self.send_to_user(role, user_id, payload.clone()).await;
        }
    }

    /// Whether at least one live session is authenticated as this identity.
    pub async fn is_online(&self, role: Role, user_id: &str) -> bool {
        let state = self.state.read().await;
        state
            .rooms
            .get(&identity_room(role, user_id))
            .is_some_and(|members| !members.is_empty())
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    fn emit(session: &Session, session_id: &Uuid, room: &str, payload: Value) {
        let event = RoomEvent {
            room: room.to_string(),
            payload,
        };
        if let Err(e) = session.sender.try_send(event) {
            // Slow or gone receiver; the disconnect path cleans up.
            tracing::warn!(session_id = %session_id, room = %room, error = %e, "Dropped realtime emit");
        }
    }
}
