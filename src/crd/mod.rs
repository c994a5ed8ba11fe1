//! # Custom Resource Definitions
//!
//! CRD types for the Secret Mangler Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - SecretMangler specification, secret template and cascade modes
//! - `status.rs` - Status reported after each reconciliation

mod spec;
mod status;

pub use spec::{
    default_api_version, default_kind, CascadeMode, SecretMangler, SecretManglerSpec,
    SecretTemplate,
};
pub use status::SecretManglerStatus;
