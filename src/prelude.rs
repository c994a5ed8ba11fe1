//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use secret_mangler_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, reconcile_template, ReconcileOutcome, Reconciler, ReconcilerError,
};

// Store capability and implementations
pub use crate::controller::store::{
    KubeSecretStore, MemorySecretStore, SecretData, SecretStore, StoreError,
};

// Reference parsing, resolution and cascade decisions
pub use crate::controller::cascade::{decide, CascadeAction, CascadeDecision, LastAction};
pub use crate::controller::indexer::{affected_templates, ReferenceIndex, TemplateRef};
pub use crate::controller::materializer::{build, MaterializeError};
pub use crate::controller::reference::{parse, MappingValue, ReferenceError, SecretReference};
pub use crate::controller::resolver::{resolve, ResolveError};

// Config types
pub use crate::config::{ControllerConfig, IndexMode, ServerConfig};
