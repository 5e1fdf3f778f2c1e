//! `RealtimePublisher` implementation backed by the connection hub.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use schoolhub_common::AppResult;
use schoolhub_core::{RealtimePublisher, Role};

use crate::hub::ConnectionHub;

/// Publishes core delivery events through the in-process hub.
#[derive(Clone)]
pub struct HubPublisher {
    hub: Arc<ConnectionHub>,
}

impl HubPublisher {
    /// Create a publisher over the given hub.
    #[must_use]
    pub fn new(hub: Arc<ConnectionHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl RealtimePublisher for HubPublisher {
    async fn send_to_user(&self, role: Role, user_id: &str, payload: Value) -> AppResult<()> {
        self.hub.send_to_user(role, user_id, payload).await;
        Ok(())
    }

    async fn send_to_users(
        &self,
        role: Role,
        user_ids: &[String],
        payload: Value,
    ) -> AppResult<()> {
        self.hub.send_to_users(role, user_ids, payload).await;
        Ok(())
    }

    async fn broadcast_to_room(&self, room: &str, payload: Value) -> AppResult<()> {
        self.hub.broadcast_to_room(room, payload).await;
        Ok(())
    }

    async fn broadcast_to_all(&self, payload: Value) -> AppResult<()> {
        self.hub.broadcast_to_all(payload).await;
        Ok(())
    }

    async fn is_online(&self, role: Role, user_id: &str) -> bool {
        self.hub.is_online(role, user_id).await
    }
}
