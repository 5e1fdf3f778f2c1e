//! HTTP surface for the notification subsystem.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use schoolhub_common::{AppError, AppResult, IdGenerator};
use schoolhub_core::{
    DeliveryOrchestrator, DeliverySummary, EndpointRegistry, NotificationEvent,
    NotificationTarget, Priority, RealtimeService, Role, TargetSpec,
};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Endpoint registry service.
    pub registry: EndpointRegistry,
    /// Delivery orchestrator service.
    pub orchestrator: DeliveryOrchestrator,
    /// Realtime publisher, used for presence queries.
    pub realtime: RealtimeService,
    /// Generator for event IDs.
    pub id_gen: IdGenerator,
}

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/push/register", post(register_endpoint))
        .route("/push/unregister", post(unregister_endpoint))
        .route("/notifications/dispatch", post(dispatch_notification))
        .route("/presence/{role}/{user_id}", get(presence))
}

fn parse_role(role: &str) -> AppResult<Role> {
    Role::parse(role).ok_or_else(|| AppError::Validation(format!("unknown role: {role}")))
}

/// Request body for endpoint registration.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RegisterEndpointRequest {
    #[validate(length(min = 1))]
    user_id: String,
    role: String,
    #[validate(length(min = 1))]
    token: String,
    #[validate(length(min = 1))]
    device_id: String,
}

async fn register_endpoint(
    State(state): State<AppState>,
    Json(req): Json<RegisterEndpointRequest>,
) -> AppResult<StatusCode> {
    req.validate()?;
    let role = parse_role(&req.role)?;
    state
        .registry
        .register(role, &req.user_id, &req.token, &req.device_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for endpoint removal.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UnregisterEndpointRequest {
    #[validate(length(min = 1))]
    user_id: String,
    role: String,
    #[validate(length(min = 1))]
    device_id: String,
}

async fn unregister_endpoint(
    State(state): State<AppState>,
    Json(req): Json<UnregisterEndpointRequest>,
) -> AppResult<StatusCode> {
    req.validate()?;
    let role = parse_role(&req.role)?;
    state
        .registry
        .unregister(role, &req.user_id, &req.device_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for dispatching a notification event.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct DispatchRequest {
    #[validate(length(min = 1))]
    title: String,
    #[validate(length(min = 1))]
    body: String,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    created_by: Option<String>,
    target: TargetSpec,
}

async fn dispatch_notification(
    State(state): State<AppState>,
    Json(req): Json<DispatchRequest>,
) -> AppResult<Json<DeliverySummary>> {
    req.validate()?;
    let target = NotificationTarget::from_spec(&req.target)?;
    let event = NotificationEvent {
        id: state.id_gen.generate(),
        title: req.title,
        body: req.body,
        priority: req.priority.unwrap_or(Priority::Normal),
        created_by: req.created_by,
    };

    let summary = state.orchestrator.dispatch_for_event(&event, &target).await?;
    Ok(Json(summary))
}

async fn presence(
    State(state): State<AppState>,
    Path((role, user_id)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let role = parse_role(&role)?;
    let online = state.realtime.is_online(role, &user_id).await;
    Ok(Json(json!({ "online": online })))
}
