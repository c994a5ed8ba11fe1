//! # Secret Store
//!
//! Store capabilities consumed by the reconciler.
//!
//! The reconciler never talks to the Kubernetes API directly. It goes through
//! [`SecretStore`], which has two implementations:
//! - [`KubeSecretStore`] - backed by the Kubernetes API server
//! - [`MemorySecretStore`] - in-memory, used by tests and dry runs

mod cluster;
mod memory;

pub use self::cluster::KubeSecretStore;
pub use self::memory::{MemorySecretStore, StoreOperation};

use crate::crd::{SecretMangler, SecretManglerStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name -> raw bytes, as held by a Secret
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Extract the byte-map of a Secret
#[must_use]
pub fn secret_data(secret: &Secret) -> SecretData {
    secret
        .data
        .as_ref()
        .map(|data| {
            data.iter()
                .map(|(key, value)| (key.clone(), value.0.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("conflict writing {kind} {namespace}/{name}")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("invalid {kind} {namespace}/{name}: {reason}")]
    Invalid {
        kind: &'static str,
        namespace: String,
        name: String,
        reason: String,
    },
    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Store capabilities used by the reconciler
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get a Secret, `None` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    /// Create a Secret, `Conflict` when it already exists
    async fn create_secret(&self, secret: &Secret) -> Result<(), StoreError>;

    /// Replace a Secret
    /// A set `resourceVersion` must match the stored one, otherwise `Conflict`.
    /// Changing the Secret `type` is rejected as `Invalid`.
    async fn update_secret(&self, secret: &Secret) -> Result<(), StoreError>;

    /// Delete a Secret, `NotFound` when it is already gone
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Persist the status of a SecretMangler
    async fn update_status(
        &self,
        mangler: &SecretMangler,
        status: &SecretManglerStatus,
    ) -> Result<(), StoreError>;
}
