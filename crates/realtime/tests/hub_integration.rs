//! Hub and publisher working together, as the orchestrator drives them.

use serde_json::json;
use std::sync::Arc;

use schoolhub_core::{RealtimePublisher, Role};
use schoolhub_realtime::{ConnectionHub, HubPublisher};

#[tokio::test]
async fn test_publisher_delivers_to_authenticated_session_only() {
    let hub = Arc::new(ConnectionHub::new(16));
    let publisher = HubPublisher::new(hub.clone());

    let (a, mut rx_a) = hub.connect().await;
    let (_b, mut rx_b) = hub.connect().await;
    hub.authenticate(a, Role::Teacher, "T1", "cred")
        .await
        .unwrap();

    publisher
        .send_to_users(
            Role::Teacher,
            &["T1".to_string(), "T2".to_string()],
            json!({"type": "notification", "id": "evt-1"}),
        )
        .await
        .unwrap();

    let event = rx_a.try_recv().unwrap();
    assert_eq!(event.room, "teacher:T1");
    assert_eq!(event.payload["id"], "evt-1");
    // The anonymous session receives nothing.
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn test_presence_follows_connection_lifecycle() {
    let hub = Arc::new(ConnectionHub::new(16));
    let publisher = HubPublisher::new(hub.clone());

    assert!(!publisher.is_online(Role::Student, "S1").await);

    let (a, _rx) = hub.connect().await;
    hub.authenticate(a, Role::Student, "S1", "cred")
        .await
        .unwrap();
    assert!(publisher.is_online(Role::Student, "S1").await);

    hub.disconnect(a).await;
    assert!(!publisher.is_online(Role::Student, "S1").await);
}

#[tokio::test]
async fn test_class_room_broadcast_spans_roles_and_sessions() {
    let hub = Arc::new(ConnectionHub::new(16));
    let publisher = HubPublisher::new(hub.clone());

    let (a, mut rx_a) = hub.connect().await;
    let (b, mut rx_b) = hub.connect().await;
    let (_c, mut rx_c) = hub.connect().await;
    hub.join_room(a, "class:10A").await.unwrap();
    hub.join_room(b, "class:10A").await.unwrap();

    publisher
        .broadcast_to_room("class:10A", json!({"n": 1}))
        .await
        .unwrap();

    assert!(rx_a.try_recv().is_ok());
    assert!(rx_b.try_recv().is_ok());
    assert!(rx_c.try_recv().is_err());
}
