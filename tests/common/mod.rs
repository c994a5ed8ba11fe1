//! Common test utilities for reconciliation tests
//!
//! Builds SecretMangler fixtures and drives reconciliation passes over the
//! in-memory store the way the controller runtime would: the status written
//! by one pass is visible to the next.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use secret_mangler_controller::controller::reconciler::{
    reconcile_template, ReconcileOutcome, ReconcilerError,
};
use secret_mangler_controller::controller::store::MemorySecretStore;
use secret_mangler_controller::crd::{CascadeMode, SecretMangler, SecretManglerSpec, SecretTemplate};

pub const NAMESPACE: &str = "default";
pub const MANGLER: &str = "base-mangler";
pub const TARGET: &str = "new-secret";

/// SecretMangler in [`NAMESPACE`] materializing [`TARGET`]
pub fn mangler(mode: Option<CascadeMode>, mappings: &[(&str, &str)]) -> SecretMangler {
    let mut mangler = SecretMangler::new(
        MANGLER,
        SecretManglerSpec {
            secret_template: SecretTemplate {
                name: TARGET.to_string(),
                namespace: NAMESPACE.to_string(),
                cascade_mode: mode,
                mappings: mappings
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                ..SecretTemplate::default()
            },
        },
    );
    mangler.metadata.namespace = Some(NAMESPACE.to_string());
    mangler.metadata.uid = Some("4b1c9a4e-0000-4000-8000-000000000001".to_string());
    mangler.metadata.generation = Some(1);
    mangler
}

/// Run one pass and feed the resulting status back into `mangler`
pub async fn pass(
    mangler: &mut SecretMangler,
    store: &MemorySecretStore,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let outcome = reconcile_template(mangler, store).await;
    if let Some(status) = store.last_status(NAMESPACE, MANGLER).await {
        mangler.status = Some(status);
    }
    outcome
}

/// Status fields of the last written status
pub async fn status(store: &MemorySecretStore) -> (bool, Option<String>) {
    let status = store
        .last_status(NAMESPACE, MANGLER)
        .await
        .expect("a status was written");
    (status.secret_created, status.last_action)
}

/// Data of the materialized Secret as UTF-8 strings
pub async fn target_data(store: &MemorySecretStore) -> Option<Vec<(String, String)>> {
    store.secret_data(NAMESPACE, TARGET).await.map(|data| {
        data.into_iter()
            .map(|(k, v)| (k, String::from_utf8(v).expect("utf-8 test data")))
            .collect()
    })
}

pub fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
