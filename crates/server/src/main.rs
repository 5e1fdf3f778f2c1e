//! Schoolhub server entry point.

mod api;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use schoolhub_common::{Config, IdGenerator};
use schoolhub_core::{
    AudienceResolver, DeliveryOrchestrator, EndpointRegistry, HttpPushGateway, InMemoryUserStore,
    NoOpPushGateway, PushDispatcher, PushGatewayService, RealtimeService, UserStoreService,
};
use schoolhub_realtime::{ConnectionHub, HubPublisher, streaming_handler};

use crate::api::AppState;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "schoolhub=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting schoolhub server...");

    // Load configuration
    let config = Config::load()?;

    // User storage collaborator (in-memory stand-in)
    let store: UserStoreService = Arc::new(InMemoryUserStore::new());

    // Push gateway
    let gateway: PushGatewayService = match (&config.push.provider_url, config.push.enabled) {
        (Some(url), true) => {
            info!(provider = %url, "Push delivery enabled");
            Arc::new(HttpPushGateway::new(
                url.clone(),
                config.push.max_batch_size,
            ))
        }
        _ => {
            warn!("Push delivery disabled or no provider configured, using no-op gateway");
            Arc::new(NoOpPushGateway::new(config.push.max_batch_size))
        }
    };

    // Realtime connection hub
    let hub = Arc::new(ConnectionHub::new(config.realtime.send_buffer));
    let realtime: RealtimeService = Arc::new(HubPublisher::new(hub.clone()));

    // Core services
    let registry = EndpointRegistry::new(store.clone(), gateway.clone());
    let resolver = AudienceResolver::new(store.clone());
    let dispatcher = PushDispatcher::new(
        gateway,
        Duration::from_secs(config.push.batch_timeout_secs),
    );
    let orchestrator = DeliveryOrchestrator::new(resolver, dispatcher, realtime.clone());

    let state = AppState {
        registry,
        orchestrator,
        realtime,
        id_gen: IdGenerator::new(),
    };

    // Build router
    let app = Router::new()
        .route(
            "/streaming",
            get(streaming_handler).with_state(hub.clone()),
        )
        .nest("/api", api::router().with_state(state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server with graceful shutdown
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
