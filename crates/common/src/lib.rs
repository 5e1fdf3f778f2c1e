//! Common utilities and shared types for schoolhub.
//!
//! This crate provides foundational components used across all schoolhub crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]

pub mod config;
pub mod error;
pub mod id;

pub use config::{Config, PushConfig, RealtimeConfig, ServerConfig};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
