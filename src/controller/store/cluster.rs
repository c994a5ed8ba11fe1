//! Kubernetes API backed store.

use super::{SecretStore, StoreError};
use crate::constants::FIELD_MANAGER;
use crate::crd::{SecretMangler, SecretManglerStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map API errors onto the store taxonomy
fn classify(err: kube::Error, kind: &'static str, namespace: &str, name: &str) -> StoreError {
    match err {
        kube::Error::Api(ref api_err) if api_err.code == 404 => StoreError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ref api_err) if api_err.code == 409 => StoreError::Conflict {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ref api_err) if api_err.code == 422 => StoreError::Invalid {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            reason: api_err.message.clone(),
        },
        other => StoreError::Kube(other),
    }
}

fn identity(secret: &Secret) -> (&str, &str) {
    (
        secret.metadata.namespace.as_deref().unwrap_or("default"),
        secret.metadata.name.as_deref().unwrap_or_default(),
    )
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        self.secrets(namespace)
            .get_opt(name)
            .await
            .map_err(|e| classify(e, "Secret", namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), StoreError> {
        let (namespace, name) = identity(secret);
        debug!(secret.namespace = namespace, secret.name = name, "store.secret.create");
        self.secrets(namespace)
            .create(&PostParams::default(), secret)
            .await
            .map_err(|e| classify(e, "Secret", namespace, name))?;
        Ok(())
    }

    async fn update_secret(&self, secret: &Secret) -> Result<(), StoreError> {
        let (namespace, name) = identity(secret);
        debug!(secret.namespace = namespace, secret.name = name, "store.secret.update");
        self.secrets(namespace)
            .replace(name, &PostParams::default(), secret)
            .await
            .map_err(|e| classify(e, "Secret", namespace, name))?;
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        debug!(secret.namespace = namespace, secret.name = name, "store.secret.delete");
        self.secrets(namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map_err(|e| classify(e, "Secret", namespace, name))?;
        Ok(())
    }

    async fn update_status(
        &self,
        mangler: &SecretMangler,
        status: &SecretManglerStatus,
    ) -> Result<(), StoreError> {
        let namespace = mangler.metadata.namespace.as_deref().unwrap_or("default");
        let name = mangler.metadata.name.as_deref().unwrap_or_default();
        let api: Api<SecretMangler> = Api::namespaced(self.client.clone(), namespace);

        let patch = serde_json::json!({
            "status": status
        });

        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(|e| classify(e, "SecretMangler", namespace, name))?;
        Ok(())
    }
}
