//! In-memory store
//!
//! Keeps Secrets and recorded SecretMangler statuses in process memory.
//! Ephemeral and thread-safe (`Arc<RwLock>`), with optimistic concurrency on
//! `resourceVersion` and injectable failures per operation.

use super::{secret_data, SecretData, SecretStore, StoreError};
use crate::crd::{SecretMangler, SecretManglerStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

type Key = (String, String);

/// Store operation, used to inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Get,
    Create,
    Update,
    Delete,
    UpdateStatus,
}

#[derive(Clone, Debug, Default)]
pub struct MemorySecretStore {
    secrets: Arc<RwLock<HashMap<Key, Secret>>>,
    statuses: Arc<RwLock<HashMap<Key, Vec<SecretManglerStatus>>>>,
    failures: Arc<RwLock<HashSet<StoreOperation>>>,
    resource_version: Arc<AtomicU64>,
    secret_writes: Arc<AtomicU64>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn secret_key(secret: &Secret) -> Key {
    key(
        secret.metadata.namespace.as_deref().unwrap_or("default"),
        secret.metadata.name.as_deref().unwrap_or_default(),
    )
}

impl MemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_resource_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    async fn check_failure(&self, operation: StoreOperation) -> Result<(), StoreError> {
        if self.failures.read().await.contains(&operation) {
            return Err(StoreError::Unavailable(format!(
                "injected failure for {operation:?}"
            )));
        }
        Ok(())
    }

    /// Seed a source Secret holding `data`
    pub async fn put_secret<K, V, I>(&self, namespace: &str, name: &str, data: I)
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>,
    {
        let data: BTreeMap<String, ByteString> = data
            .into_iter()
            .map(|(k, v)| (k.into(), ByteString(v.into())))
            .collect();
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                resource_version: Some(self.next_resource_version()),
                ..ObjectMeta::default()
            },
            data: Some(data),
            type_: Some("Opaque".to_string()),
            ..Secret::default()
        };
        self.secrets.write().await.insert(key(namespace, name), secret);
    }

    /// Seed a complete Secret, as another writer would leave it
    pub async fn insert_secret(&self, mut secret: Secret) {
        secret.metadata.resource_version = Some(self.next_resource_version());
        let k = secret_key(&secret);
        self.secrets.write().await.insert(k, secret);
    }

    /// Remove a Secret behind the reconciler's back
    pub async fn remove_secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets.write().await.remove(&key(namespace, name))
    }

    pub async fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets.read().await.get(&key(namespace, name)).cloned()
    }

    pub async fn secret_data(&self, namespace: &str, name: &str) -> Option<SecretData> {
        self.secret(namespace, name).await.as_ref().map(secret_data)
    }

    /// All statuses written for a SecretMangler, oldest first
    pub async fn status_updates(&self, namespace: &str, name: &str) -> Vec<SecretManglerStatus> {
        self.statuses
            .read()
            .await
            .get(&key(namespace, name))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn last_status(&self, namespace: &str, name: &str) -> Option<SecretManglerStatus> {
        self.status_updates(namespace, name).await.pop()
    }

    /// Number of successful create/update/delete calls on Secrets
    #[must_use]
    pub fn secret_writes(&self) -> u64 {
        self.secret_writes.load(Ordering::SeqCst)
    }

    pub async fn fail_on(&self, operation: StoreOperation) {
        self.failures.write().await.insert(operation);
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        self.check_failure(StoreOperation::Get).await?;
        Ok(self.secret(namespace, name).await)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), StoreError> {
        self.check_failure(StoreOperation::Create).await?;
        let k = secret_key(secret);
        let mut secrets = self.secrets.write().await;
        if secrets.contains_key(&k) {
            return Err(StoreError::Conflict {
                kind: "Secret",
                namespace: k.0,
                name: k.1,
            });
        }
        let mut stored = secret.clone();
        stored.metadata.resource_version = Some(self.next_resource_version());
        secrets.insert(k, stored);
        self.secret_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_secret(&self, secret: &Secret) -> Result<(), StoreError> {
        self.check_failure(StoreOperation::Update).await?;
        let k = secret_key(secret);
        let mut secrets = self.secrets.write().await;
        let Some(current) = secrets.get(&k) else {
            return Err(StoreError::NotFound {
                kind: "Secret",
                namespace: k.0,
                name: k.1,
            });
        };
        if let Some(expected) = &secret.metadata.resource_version {
            if current.metadata.resource_version.as_ref() != Some(expected) {
                return Err(StoreError::Conflict {
                    kind: "Secret",
                    namespace: k.0,
                    name: k.1,
                });
            }
        }
        // The API server treats the type as immutable
        if current.type_ != secret.type_ {
            return Err(StoreError::Invalid {
                kind: "Secret",
                reason: format!(
                    "field is immutable: type {:?} -> {:?}",
                    current.type_, secret.type_
                ),
                namespace: k.0,
                name: k.1,
            });
        }
        let mut stored = secret.clone();
        stored.metadata.resource_version = Some(self.next_resource_version());
        secrets.insert(k, stored);
        self.secret_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.check_failure(StoreOperation::Delete).await?;
        match self.secrets.write().await.remove(&key(namespace, name)) {
            Some(_) => {
                self.secret_writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: "Secret",
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
        }
    }

    async fn update_status(
        &self,
        mangler: &SecretMangler,
        status: &SecretManglerStatus,
    ) -> Result<(), StoreError> {
        self.check_failure(StoreOperation::UpdateStatus).await?;
        let k = key(
            mangler.metadata.namespace.as_deref().unwrap_or("default"),
            mangler.metadata.name.as_deref().unwrap_or_default(),
        );
        self.statuses
            .write()
            .await
            .entry(k)
            .or_default()
            .push(status.clone());
        Ok(())
    }
}
