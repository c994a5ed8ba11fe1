//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::cascade::LastAction;
use crate::controller::materializer::MaterializeError;
use crate::controller::store::{SecretStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Errors handed to the controller runtime, all retried with backoff
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Linkage(#[from] MaterializeError),
    #[error("invalid SecretMangler: {0}")]
    Configuration(String),
}

/// Result of a single reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The materialized Secret was created
    Created,
    /// The materialized Secret was replaced with newly resolved data
    Updated { last_action: LastAction },
    /// The materialized Secret was deleted
    Deleted { last_action: LastAction },
    /// Data is in sync, nothing was written to the Secret
    Unchanged,
    /// `KeepNoAction`: the existing Secret is left as is without resolving
    Frozen,
    /// Creation deferred, a referenced Secret does not exist yet
    SourceMissing { namespace: String, name: String },
    /// Creation skipped, no mapping resolved to a value
    NothingToCreate,
    /// A mapping value is malformed; only an edit of the SecretMangler can fix it
    InvalidMapping { field: String, reason: String },
}

impl ReconcileOutcome {
    /// Label used for the actions metric
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            ReconcileOutcome::Created => "Create",
            ReconcileOutcome::Updated { .. } => "Update",
            ReconcileOutcome::Deleted { .. } => "Delete",
            ReconcileOutcome::Unchanged
            | ReconcileOutcome::Frozen
            | ReconcileOutcome::NothingToCreate => "NoAction",
            ReconcileOutcome::SourceMissing { .. } => "Deferred",
            ReconcileOutcome::InvalidMapping { .. } => "Invalid",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min, max),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared reconciliation context
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn SecretStore>,
    pub config: Arc<ControllerConfig>,
    // Backoff state per resource (identified by namespace/name), advanced by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>, config: ControllerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Advance the backoff of `resource_key`, returning the delay and the error count
    pub fn next_backoff(&self, resource_key: &str) -> (Duration, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(resource_key.to_string()).or_insert_with(|| {
            BackoffState::new(
                self.config.backoff_min_duration(),
                self.config.backoff_max_duration(),
            )
        });
        state.increment_error();
        (state.backoff.next_backoff(), state.error_count)
    }

    /// Forget the backoff of `resource_key` after a successful pass
    pub fn reset_backoff(&self, resource_key: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(resource_key);
    }
}
