//! Notification delivery services.

#![allow(missing_docs)]

pub mod audience;
pub mod endpoint_registry;
pub mod orchestrator;
pub mod push_dispatcher;
pub mod push_gateway;
pub mod realtime;
pub mod user_store;

pub use audience::{Audience, AudienceResolver, NotificationTarget, Recipient, TargetSpec};
pub use endpoint_registry::EndpointRegistry;
pub use orchestrator::{DeliveryOrchestrator, DeliverySummary, NotificationEvent, Priority};
pub use push_dispatcher::PushDispatcher;
pub use push_gateway::{
    DeliveryReceipt, HttpPushGateway, NoOpPushGateway, PushGateway, PushGatewayService,
    PushMessage, ReceiptStatus,
};
pub use realtime::{NoOpRealtimePublisher, RealtimePublisher, RealtimeService};
pub use user_store::{EndpointToken, InMemoryUserStore, Role, User, UserStore, UserStoreService};
