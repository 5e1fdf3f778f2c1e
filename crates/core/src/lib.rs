//! Core notification delivery logic for schoolhub.

pub mod services;

pub use services::*;
