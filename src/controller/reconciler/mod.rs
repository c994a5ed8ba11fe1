//! # Reconciler
//!
//! Reconciliation of `SecretMangler` resources.
//!
//! The reconciler:
//! - Materializes the Secret described by `spec.secretTemplate`
//! - Re-resolves referenced secrets on every pass, nothing is cached
//! - Applies the cascade mode when referenced data disappears
//! - Reports `secretCreated` and `lastAction` in the status
//!
//! Store access goes through [`crate::controller::store::SecretStore`], so a
//! pass runs the same against the API server and the in-memory store.

mod reconcile;
mod status;
mod types;

pub use reconcile::{reconcile, reconcile_template};
pub use status::{next_status, persist_status};
pub use types::{BackoffState, ReconcileOutcome, Reconciler, ReconcilerError};
