//! Realtime delivery for schoolhub.
//!
//! Maintains live WebSocket connections keyed by user identity and
//! provides room-based fan-out. The hub is an explicitly constructed
//! instance created at process start and passed by reference; there is
//! no global connection state.

pub mod hub;
pub mod publisher;
pub mod ws;

pub use hub::{ConnectionHub, RoomEvent, identity_room};
pub use publisher::HubPublisher;
pub use ws::streaming_handler;
