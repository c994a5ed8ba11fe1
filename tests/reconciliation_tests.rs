//! # Reconciliation Tests
//!
//! End-to-end reconciliation passes over the in-memory store.
//!
//! These tests verify:
//! - Literal and referenced values land in the materialized Secret
//! - A second pass without changes writes nothing
//! - Each cascade mode's reaction to a deleted source Secret
//! - Malformed mappings and store failures leave status untouched

mod common;

use common::{mangler, pairs, pass, status, target_data, MANGLER, NAMESPACE, TARGET};
use secret_mangler_controller::controller::cascade::LastAction;
use secret_mangler_controller::controller::reconciler::{ReconcileOutcome, ReconcilerError};
use secret_mangler_controller::controller::store::{MemorySecretStore, StoreOperation};
use secret_mangler_controller::crd::CascadeMode;
use std::collections::BTreeMap;

const ALL_MODES: [Option<CascadeMode>; 5] = [
    None,
    Some(CascadeMode::KeepNoAction),
    Some(CascadeMode::KeepLostSync),
    Some(CascadeMode::RemoveLostSync),
    Some(CascadeMode::CascadeDelete),
];

#[tokio::test]
async fn test_literal_only_mappings_materialize_verbatim_in_every_mode() {
    for mode in ALL_MODES {
        let store = MemorySecretStore::new();
        let mut m = mangler(mode, &[("user", "admin"), ("url", "postgres://db:5432/app")]);

        assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Created);
        assert_eq!(
            target_data(&store).await.unwrap(),
            pairs(&[("url", "postgres://db:5432/app"), ("user", "admin")]),
            "mode {mode:?}"
        );
        assert_eq!(status(&store).await, (true, Some("Create".to_string())));
    }
}

#[tokio::test]
async fn test_reference_and_literal_resolve_to_two_entries() {
    let store = MemorySecretStore::new();
    store
        .put_secret(NAMESPACE, "reference-secret", [("test", "ZGVydGVzdGRlcg==")])
        .await;
    let mut m = mangler(
        None,
        &[
            ("dynamicmapping", "<reference-secret:test>"),
            ("fixedmapping", "fixed-test"),
        ],
    );

    assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Created);

    let data = target_data(&store).await.unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(
        data,
        pairs(&[
            ("dynamicmapping", "ZGVydGVzdGRlcg=="),
            ("fixedmapping", "fixed-test"),
        ])
    );
}

#[tokio::test]
async fn test_materialized_secret_is_owned_by_the_mangler() {
    let store = MemorySecretStore::new();
    let mut m = mangler(None, &[("a", "literal")]);

    pass(&mut m, &store).await.unwrap();

    let secret = store.secret(NAMESPACE, TARGET).await.unwrap();
    assert_eq!(secret.type_.as_deref(), Some("Opaque"));
    let owners = secret.metadata.owner_references.unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].kind, "SecretMangler");
    assert_eq!(owners[0].name, MANGLER);
    assert_eq!(owners[0].controller, Some(true));
}

#[tokio::test]
async fn test_second_pass_without_changes_writes_nothing() {
    for mode in [
        Some(CascadeMode::KeepLostSync),
        Some(CascadeMode::RemoveLostSync),
        Some(CascadeMode::CascadeDelete),
    ] {
        let store = MemorySecretStore::new();
        store.put_secret(NAMESPACE, "source", [("key", "value")]).await;
        let mut m = mangler(mode, &[("a", "<source:key>"), ("b", "literal")]);

        assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Created);
        let writes = store.secret_writes();
        let statuses = store.status_updates(NAMESPACE, MANGLER).await.len();
        let data = target_data(&store).await;

        assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Unchanged);
        assert_eq!(store.secret_writes(), writes, "mode {mode:?}");
        assert_eq!(store.status_updates(NAMESPACE, MANGLER).await.len(), statuses);
        assert_eq!(target_data(&store).await, data);
        assert_eq!(status(&store).await, (true, Some("Create".to_string())));
    }
}

#[tokio::test]
async fn test_sync_keeps_metadata_and_type_set_by_others() {
    let store = MemorySecretStore::new();
    store.put_secret(NAMESPACE, "source", [("key", "v1")]).await;
    let mut m = mangler(Some(CascadeMode::RemoveLostSync), &[("a", "<source:key>")]);
    pass(&mut m, &store).await.unwrap();

    let mut edited = store.secret(NAMESPACE, TARGET).await.unwrap();
    edited.type_ = Some("kubernetes.io/basic-auth".to_string());
    edited.metadata.labels = Some(BTreeMap::from([(
        "app.kubernetes.io/part-of".to_string(),
        "billing".to_string(),
    )]));
    edited.metadata.annotations = Some(BTreeMap::from([(
        "reloader/match".to_string(),
        "true".to_string(),
    )]));
    store.insert_secret(edited).await;

    store.put_secret(NAMESPACE, "source", [("key", "v2")]).await;
    assert_eq!(
        pass(&mut m, &store).await.unwrap(),
        ReconcileOutcome::Updated {
            last_action: LastAction::RemoveLostSync
        }
    );

    let secret = store.secret(NAMESPACE, TARGET).await.unwrap();
    assert_eq!(secret.type_.as_deref(), Some("kubernetes.io/basic-auth"));
    assert_eq!(
        secret.metadata.labels.unwrap()["app.kubernetes.io/part-of"],
        "billing"
    );
    assert_eq!(secret.metadata.annotations.unwrap()["reloader/match"], "true");
    assert_eq!(secret.metadata.owner_references.unwrap().len(), 1);
    assert_eq!(target_data(&store).await.unwrap(), pairs(&[("a", "v2")]));
}

#[tokio::test]
async fn test_keep_no_action_freezes_the_secret_after_creation() {
    let store = MemorySecretStore::new();
    store.put_secret(NAMESPACE, "source", [("key", "v1")]).await;
    let mut m = mangler(None, &[("a", "<source:key>")]);
    pass(&mut m, &store).await.unwrap();

    store.put_secret(NAMESPACE, "source", [("key", "v2")]).await;
    assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Frozen);
    store.remove_secret(NAMESPACE, "source").await;
    assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Frozen);

    assert_eq!(target_data(&store).await.unwrap(), pairs(&[("a", "v1")]));
    assert_eq!(store.secret_writes(), 1);
}

#[tokio::test]
async fn test_changed_source_value_is_synced() {
    let store = MemorySecretStore::new();
    store.put_secret(NAMESPACE, "source", [("key", "v1")]).await;
    let mut m = mangler(Some(CascadeMode::RemoveLostSync), &[("a", "<source:key>")]);
    pass(&mut m, &store).await.unwrap();

    store.put_secret(NAMESPACE, "source", [("key", "v2")]).await;

    assert_eq!(
        pass(&mut m, &store).await.unwrap(),
        ReconcileOutcome::Updated {
            last_action: LastAction::RemoveLostSync
        }
    );
    assert_eq!(target_data(&store).await.unwrap(), pairs(&[("a", "v2")]));
    assert_eq!(
        status(&store).await,
        (true, Some("RemoveLostSync".to_string()))
    );
}

#[tokio::test]
async fn test_field_appearing_later_is_added() {
    let store = MemorySecretStore::new();
    store.put_secret(NAMESPACE, "source", [("key", "v1")]).await;
    let mut m = mangler(
        Some(CascadeMode::KeepLostSync),
        &[("a", "<source:key>"), ("b", "<source:extra>")],
    );

    assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Created);
    assert_eq!(target_data(&store).await.unwrap(), pairs(&[("a", "v1")]));

    store
        .put_secret(NAMESPACE, "source", [("key", "v1"), ("extra", "late")])
        .await;

    assert_eq!(
        pass(&mut m, &store).await.unwrap(),
        ReconcileOutcome::Updated {
            last_action: LastAction::KeepLostSync
        }
    );
    assert_eq!(
        target_data(&store).await.unwrap(),
        pairs(&[("a", "v1"), ("b", "late")])
    );
}

#[tokio::test]
async fn test_keep_lost_sync_preserves_last_known_value() {
    let store = MemorySecretStore::new();
    store.put_secret(NAMESPACE, "source", [("key", "secret-value")]).await;
    let mut m = mangler(
        Some(CascadeMode::KeepLostSync),
        &[("a", "<source:key>"), ("b", "literal")],
    );
    pass(&mut m, &store).await.unwrap();
    let writes = store.secret_writes();

    store.remove_secret(NAMESPACE, "source").await;

    assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Unchanged);
    assert_eq!(
        target_data(&store).await.unwrap(),
        pairs(&[("a", "secret-value"), ("b", "literal")])
    );
    assert_eq!(store.secret_writes(), writes);
    assert_eq!(status(&store).await, (true, Some("KeepLostSync".to_string())));
}

#[tokio::test]
async fn test_keep_lost_sync_is_idempotent_while_source_is_gone() {
    let store = MemorySecretStore::new();
    store.put_secret(NAMESPACE, "source", [("key", "secret-value")]).await;
    let mut m = mangler(
        Some(CascadeMode::KeepLostSync),
        &[("a", "<source:key>"), ("b", "literal")],
    );
    pass(&mut m, &store).await.unwrap();
    store.remove_secret(NAMESPACE, "source").await;
    pass(&mut m, &store).await.unwrap();

    let writes = store.secret_writes();
    let statuses = store.status_updates(NAMESPACE, MANGLER).await.len();

    for _ in 0..3 {
        assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Unchanged);
    }
    assert_eq!(store.secret_writes(), writes);
    assert_eq!(store.status_updates(NAMESPACE, MANGLER).await.len(), statuses);

    // A returning source with a new value is synced again
    store.put_secret(NAMESPACE, "source", [("key", "rotated")]).await;
    assert_eq!(
        pass(&mut m, &store).await.unwrap(),
        ReconcileOutcome::Updated {
            last_action: LastAction::KeepLostSync
        }
    );
    assert_eq!(
        target_data(&store).await.unwrap(),
        pairs(&[("a", "rotated"), ("b", "literal")])
    );
}

#[tokio::test]
async fn test_remove_lost_sync_drops_lost_field() {
    let store = MemorySecretStore::new();
    store.put_secret(NAMESPACE, "source", [("key", "secret-value")]).await;
    let mut m = mangler(
        Some(CascadeMode::RemoveLostSync),
        &[("a", "<source:key>"), ("b", "literal")],
    );
    pass(&mut m, &store).await.unwrap();

    store.remove_secret(NAMESPACE, "source").await;

    assert_eq!(
        pass(&mut m, &store).await.unwrap(),
        ReconcileOutcome::Updated {
            last_action: LastAction::RemoveLostSync
        }
    );
    assert_eq!(target_data(&store).await.unwrap(), pairs(&[("b", "literal")]));
    assert_eq!(
        status(&store).await,
        (true, Some("RemoveLostSync".to_string()))
    );
}

#[tokio::test]
async fn test_remove_lost_sync_deletes_secret_when_only_field_is_lost() {
    let store = MemorySecretStore::new();
    store.put_secret(NAMESPACE, "source", [("key", "secret-value")]).await;
    let mut m = mangler(Some(CascadeMode::RemoveLostSync), &[("a", "<source:key>")]);
    pass(&mut m, &store).await.unwrap();

    store.remove_secret(NAMESPACE, "source").await;

    assert_eq!(
        pass(&mut m, &store).await.unwrap(),
        ReconcileOutcome::Deleted {
            last_action: LastAction::RemoveLostSync
        }
    );
    assert!(store.secret(NAMESPACE, TARGET).await.is_none());
    assert_eq!(
        status(&store).await,
        (false, Some("RemoveLostSync".to_string()))
    );

    // Nothing to fall back to until the source returns
    assert_eq!(
        pass(&mut m, &store).await.unwrap(),
        ReconcileOutcome::SourceMissing {
            namespace: NAMESPACE.to_string(),
            name: "source".to_string()
        }
    );
    assert!(store.secret(NAMESPACE, TARGET).await.is_none());
}

#[tokio::test]
async fn test_cascade_delete_removes_secret_even_if_other_fields_resolve() {
    let store = MemorySecretStore::new();
    store.put_secret("team-a", "db", [("password", "hunter2")]).await;
    store.put_secret("team-b", "api", [("token", "abc123")]).await;
    let mut m = mangler(
        Some(CascadeMode::CascadeDelete),
        &[
            ("password", "<team-a/db:password>"),
            ("token", "<team-b/api:token>"),
            ("fixed", "fixed-test"),
        ],
    );

    assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Created);
    assert_eq!(target_data(&store).await.unwrap().len(), 3);

    store.remove_secret("team-b", "api").await;

    assert_eq!(
        pass(&mut m, &store).await.unwrap(),
        ReconcileOutcome::Deleted {
            last_action: LastAction::CascadeDelete
        }
    );
    assert!(store.secret(NAMESPACE, TARGET).await.is_none());
    assert_eq!(
        status(&store).await,
        (false, Some("CascadeDelete".to_string()))
    );
}

#[tokio::test]
async fn test_deleted_target_is_recreated() {
    let store = MemorySecretStore::new();
    let mut m = mangler(Some(CascadeMode::KeepLostSync), &[("a", "literal")]);
    pass(&mut m, &store).await.unwrap();

    store.remove_secret(NAMESPACE, TARGET).await;

    assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Created);
    assert_eq!(target_data(&store).await.unwrap(), pairs(&[("a", "literal")]));
}

#[tokio::test]
async fn test_missing_source_defers_creation_without_status() {
    let store = MemorySecretStore::new();
    let mut m = mangler(
        Some(CascadeMode::KeepLostSync),
        &[("a", "<shared/source:key>"), ("b", "literal")],
    );

    assert_eq!(
        pass(&mut m, &store).await.unwrap(),
        ReconcileOutcome::SourceMissing {
            namespace: "shared".to_string(),
            name: "source".to_string()
        }
    );
    assert!(store.secret(NAMESPACE, TARGET).await.is_none());
    assert!(store.status_updates(NAMESPACE, MANGLER).await.is_empty());

    store.put_secret("shared", "source", [("key", "v")]).await;
    assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Created);
}

#[tokio::test]
async fn test_malformed_mapping_leaves_secret_and_status_untouched() {
    let store = MemorySecretStore::new();
    let mut m = mangler(Some(CascadeMode::KeepLostSync), &[("a", "literal")]);
    pass(&mut m, &store).await.unwrap();
    let statuses = store.status_updates(NAMESPACE, MANGLER).await.len();

    m.spec
        .secret_template
        .mappings
        .insert("b".to_string(), "<no-field-separator>".to_string());

    let outcome = pass(&mut m, &store).await.unwrap();

    assert!(
        matches!(outcome, ReconcileOutcome::InvalidMapping { ref field, .. } if field == "b"),
        "unexpected outcome {outcome:?}"
    );
    assert_eq!(store.secret_writes(), 1);
    assert_eq!(store.status_updates(NAMESPACE, MANGLER).await.len(), statuses);
    assert_eq!(target_data(&store).await.unwrap(), pairs(&[("a", "literal")]));
}

#[tokio::test]
async fn test_store_failures_surface_as_retryable_errors() {
    let store = MemorySecretStore::new();
    store.fail_on(StoreOperation::Get).await;
    let mut m = mangler(Some(CascadeMode::CascadeDelete), &[("a", "literal")]);

    let err = pass(&mut m, &store).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::Store(_)), "{err}");
    assert!(store.status_updates(NAMESPACE, MANGLER).await.is_empty());

    store.clear_failures().await;
    assert_eq!(pass(&mut m, &store).await.unwrap(), ReconcileOutcome::Created);

    store.fail_on(StoreOperation::Update).await;
    m.spec
        .secret_template
        .mappings
        .insert("a".to_string(), "changed".to_string());

    let err = pass(&mut m, &store).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::Store(_)), "{err}");
    assert_eq!(target_data(&store).await.unwrap(), pairs(&[("a", "literal")]));
}

#[tokio::test]
async fn test_owner_in_another_namespace_is_linkage_error() {
    let store = MemorySecretStore::new();
    let mut m = mangler(None, &[("a", "literal")]);
    m.spec.secret_template.namespace = "elsewhere".to_string();

    let err = pass(&mut m, &store).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Linkage(_)), "{err}");
    assert!(store.secret("elsewhere", TARGET).await.is_none());
}
