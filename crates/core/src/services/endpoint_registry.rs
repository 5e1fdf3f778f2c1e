//! Endpoint registry service.
//!
//! Tracks which push endpoints belong to which user, one token per
//! (user, device) slot. Registering a new token for a known device
//! replaces the old one.

use chrono::Utc;

use schoolhub_common::{AppError, AppResult};

use crate::services::push_gateway::PushGatewayService;
use crate::services::user_store::{EndpointToken, Role, UserStoreService};

/// Endpoint registry service.
#[derive(Clone)]
pub struct EndpointRegistry {
    store: UserStoreService,
    gateway: PushGatewayService,
}

impl EndpointRegistry {
    /// Create a new endpoint registry.
    #[must_use]
    pub fn new(store: UserStoreService, gateway: PushGatewayService) -> Self {
        Self { store, gateway }
    }

    /// Register a push endpoint for a device.
    ///
    /// Any existing token for the same device is replaced; repeated calls
    /// with the same token and device are idempotent. Last write wins when
    /// two registrations race on the same device slot.
    pub async fn register(
        &self,
        role: Role,
        user_id: &str,
        token: &str,
        device_id: &str,
    ) -> AppResult<()> {
        if !self.gateway.is_valid_token(token) {
            return Err(AppError::InvalidTokenFormat(token.to_string()));
        }

        let user = self
            .store
            .find_by_id(role, user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

        let mut tokens = user.push_tokens;
        tokens.retain(|t| t.device_id != device_id);
        tokens.push(EndpointToken {
            token: token.to_string(),
            device_id: device_id.to_string(),
            registered_at: Utc::now(),
        });

        self.store.save_tokens(role, user_id, tokens).await?;
        tracing::debug!(user_id = %user_id, role = %role, device_id = %device_id, "Push endpoint registered");
        Ok(())
    }

    /// Remove the push endpoint registered for a device.
    ///
    /// A no-op when the device has no registered token.
    pub async fn unregister(&self, role: Role, user_id: &str, device_id: &str) -> AppResult<()> {
        let user = self
            .store
            .find_by_id(role, user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

        let mut tokens = user.push_tokens;
        let before = tokens.len();
        tokens.retain(|t| t.device_id != device_id);

        if tokens.len() == before {
            // Nothing registered for this device.
            return Ok(());
        }

        self.store.save_tokens(role, user_id, tokens).await?;
        tracing::debug!(user_id = %user_id, role = %role, device_id = %device_id, "Push endpoint removed");
        Ok(())
    }
}
