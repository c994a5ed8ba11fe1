//! Secret Mangler Controller Library
//!
//! This library provides the core functionality for the Secret Mangler Controller:
//! a Kubernetes controller that materializes a Secret from a `SecretMangler`
//! template made of literal values and fields of other Secrets, and keeps it in
//! sync as those Secrets change.
//!
//! ## Quick Start
//!
//! ```rust
//! use secret_mangler_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
