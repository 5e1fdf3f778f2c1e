//! Realtime publisher abstraction.
//!
//! Provides an abstraction for delivering events to live connections.
//! The actual implementation is provided by the realtime crate.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use schoolhub_common::AppResult;

use crate::services::user_store::Role;

/// Trait for fire-and-forget delivery to live connections.
///
/// This allows the core services to reach connected clients
/// without directly depending on the transport implementation.
/// Delivery is best-effort: an offline recipient is silently skipped.
#[async_trait]
pub trait RealtimePublisher: Send + Sync {
    /// Emit a payload to one user's identity room.
    async fn send_to_user(&self, role: Role, user_id: &str, payload: Value) -> AppResult<()>;

    /// Emit a payload to each user in the list, sequentially.
    /// No atomicity across the set.
    async fn send_to_users(&self, role: Role, user_ids: &[String], payload: Value)
    -> AppResult<()>;

    /// Emit a payload to every connection joined to a named room.
    async fn broadcast_to_room(&self, room: &str, payload: Value) -> AppResult<()>;

    /// Emit a payload to every live connection.
    async fn broadcast_to_all(&self, payload: Value) -> AppResult<()>;

    /// Whether at least one live session matches the identity.
    async fn is_online(&self, role: Role, user_id: &str) -> bool;
}

/// Wrapper for boxed `RealtimePublisher` trait object.
pub type RealtimeService = Arc<dyn RealtimePublisher>;

/// A no-op implementation for testing or when realtime delivery is disabled.
#[derive(Clone, Default)]
pub struct NoOpRealtimePublisher;

#[async_trait]
impl RealtimePublisher for NoOpRealtimePublisher {
    async fn send_to_user(&self, _role: Role, _user_id: &str, _payload: Value) -> AppResult<()> {
        Ok(())
    }

    async fn send_to_users(
        &self,
        _role: Role,
        _user_ids: &[String],
        _payload: Value,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn broadcast_to_room(&self, _room: &str, _payload: Value) -> AppResult<()> {
        Ok(())
    }

    async fn broadcast_to_all(&self, _payload: Value) -> AppResult<()> {
        Ok(())
    }

    async fn is_online(&self, _role: Role, _user_id: &str) -> bool {
        false
    }
}
