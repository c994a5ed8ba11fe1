//! # Configuration
//!
//! Environment-driven settings for the controller and its HTTP server.

mod controller;

pub use controller::{ControllerConfig, IndexMode, ServerConfig};
