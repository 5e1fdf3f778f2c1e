//! Delivery orchestrator service.
//!
//! Entry point for "an event happened, notify its audience": resolves the
//! audience once, then fans out over the push channel and the realtime
//! channel concurrently. The two channels are failure-isolated; the goal
//! is at-least-one-channel delivery, never all-or-nothing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use schoolhub_common::AppResult;

use crate::services::audience::{Audience, AudienceResolver, NotificationTarget};
use crate::services::push_dispatcher::PushDispatcher;
use crate::services::realtime::RealtimeService;
use crate::services::user_store::Role;

/// Notification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Normal => "normal",
            Self::High => "high",
        };
        write!(f, "{s}")
    }
}

/// A durable notification event, consumed read-only.
///
/// Persistence of the record itself is owned by an external collaborator;
/// the orchestrator only derives audience and payload from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// Event identity.
    pub id: String,
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Delivery priority.
    pub priority: Priority,
    /// Identity of the actor that created the event.
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Summary of one dispatch call, returned for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySummary {
    /// Number of resolved recipients.
    pub recipient_count: usize,
    /// Number of delivery receipts aggregated from the push provider.
    pub push_receipt_count: usize,
    /// Number of recipients a realtime emit was attempted for.
    pub realtime_attempted: usize,
}

/// Delivery orchestrator service.
#[derive(Clone)]
pub struct DeliveryOrchestrator {
    resolver: AudienceResolver,
    dispatcher: PushDispatcher,
    realtime: RealtimeService,
}

impl DeliveryOrchestrator {
    /// Create a new delivery orchestrator.
    #[must_use]
    pub fn new(
        resolver: AudienceResolver,
        dispatcher: PushDispatcher,
        realtime: RealtimeService,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            realtime,
        }
    }

    /// Deliver an event to its resolved audience over both channels.
    ///
    /// Fails only for resolution errors (malformed target, missing single
    /// user); partial delivery failures are logged and reflected in the
    /// summary counts, never raised.
    pub async fn dispatch_for_event(
        &self,
        event: &NotificationEvent,
        target: &NotificationTarget,
    ) -> AppResult<DeliverySummary> {
        let audience = self.resolver.resolve(target).await?;

        if audience.is_empty() {
            tracing::info!(event_id = %event.id, "No eligible recipients, skipping dispatch");
            return Ok(DeliverySummary::default());
        }

        let recipient_count = audience.recipients.len();

        let push_fut = self.dispatch_push(event, &audience);
        let realtime_fut = self.dispatch_realtime(event, &audience);

        // The two channels run concurrently and are failure-isolated:
        // neither outcome gates the other.
        let (push_receipt_count, realtime_attempted) = tokio::join!(push_fut, realtime_fut);

        let summary = DeliverySummary {
            recipient_count,
            push_receipt_count,
            realtime_attempted,
        };
        tracing::info!(
            event_id = %event.id,
            recipients = summary.recipient_count,
            push_receipts = summary.push_receipt_count,
            realtime_attempted = summary.realtime_attempted,
            "Event dispatch completed"
        );
        Ok(summary)
    }

    async fn dispatch_push(&self, event: &NotificationEvent, audience: &Audience) -> usize {
        let mut data = BTreeMap::new();
        data.insert("notificationId".to_string(), event.id.clone());
        data.insert("priority".to_string(), event.priority.to_string());

        self.dispatcher
            .send_batch(&audience.tokens, &event.title, &event.body, data)
            .await
            .len()
    }

    async fn dispatch_realtime(&self, event: &NotificationEvent, audience: &Audience) -> usize {
        let payload = serde_json::json!({
            "type": "notification",
            "id": event.id,
            "title": event.title,
            "body": event.body,
            "priority": event.priority,
        });

        let mut attempted = 0;
        for role in [Role::Teacher, Role::Student] {
            let user_ids: Vec<String> = audience
                .recipients
                .iter()
                .filter(|r| r.role == role)
                .map(|r| r.user_id.clone())
                .collect();
            if user_ids.is_empty() {
                continue;
            }
            attempted += user_ids.len();
            if let Err(e) = self
                .realtime
                .send_to_users(role, &user_ids, payload.clone())
                .await
            {
                tracing::warn!(event_id = %event.id, role = %role, error = %e, "Realtime delivery failed");
            }
        }
        attempted
    }
}
