//! # Reconciliation Logic
//!
//! One pass over a SecretMangler:
//!
//! 1. Fetch the materialized Secret.
//! 2. Absent: resolve with fail-fast lookups, build, create, report `Create`.
//! 3. Present under `KeepNoAction`: stop, the Secret stays frozen.
//! 4. Present otherwise: resolve leniently, let the cascade engine decide, then
//!    update or delete the Secret and report the mode's label.
//!
//! [`reconcile_template`] holds the pass itself and works against any
//! [`SecretStore`]. [`reconcile`] is the controller entry point that maps the
//! outcome onto a requeue [`Action`].

use crate::controller::cascade::{self, CascadeAction, LastAction};
use crate::controller::materializer;
use crate::controller::reconciler::status::{next_status, persist_status};
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::controller::resolver::{resolve, ResolveError};
use crate::controller::store::{secret_data, SecretStore};
use crate::crd::{CascadeMode, SecretMangler};
use crate::observability;
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Entry point for the controller runtime
///
/// Store and linkage failures are returned as errors so the error policy can
/// apply backoff. Everything else maps to an [`Action`].
pub async fn reconcile(
    mangler: Arc<SecretMangler>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let name = mangler.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = mangler.metadata.namespace.as_deref().unwrap_or("default");
    let template = &mangler.spec.secret_template;

    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        resource.name = name,
        resource.namespace = namespace,
        resource.kind = "SecretMangler",
        target.name = template.name.as_str(),
        target.namespace = template.namespace.as_str(),
        cascade_mode = template.cascade_mode().as_str()
    );

    observability::metrics::increment_reconciliations();
    let result = reconcile_template(&mangler, ctx.store.as_ref())
        .instrument(span.clone())
        .await;
    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    let _guard = span.enter();

    let outcome = result?;
    ctx.reset_backoff(&format!("{namespace}/{name}"));
    observability::metrics::increment_actions(outcome.action());

    let action = match outcome {
        ReconcileOutcome::SourceMissing {
            namespace: source_namespace,
            name: source_name,
        } => {
            let delay = ctx.config.source_missing_requeue_duration();
            info!(
                source.namespace = source_namespace.as_str(),
                source.name = source_name.as_str(),
                requeue_secs = delay.as_secs(),
                "Referenced secret does not exist yet, creation deferred"
            );
            observability::metrics::increment_source_missing();
            observability::metrics::increment_requeues_total("source-missing");
            Action::requeue(delay)
        }
        ReconcileOutcome::InvalidMapping { field, reason } => {
            error!(
                mapping = field.as_str(),
                reason = reason.as_str(),
                "Malformed mapping, waiting for the SecretMangler to change"
            );
            observability::metrics::increment_malformed_references();
            Action::await_change()
        }
        outcome => {
            debug!(action = outcome.action(), outcome = ?outcome, "reconcile.completed");
            Action::await_change()
        }
    };

    Ok(action)
}

/// Run one reconciliation pass for `mangler` against `store`
///
/// # Errors
///
/// - [`ReconcilerError::Store`] when a store read or write fails
/// - [`ReconcilerError::Linkage`] when the owner reference cannot be attached
/// - [`ReconcilerError::Configuration`] when the SecretMangler has no namespace
pub async fn reconcile_template<S>(
    mangler: &SecretMangler,
    store: &S,
) -> Result<ReconcileOutcome, ReconcilerError>
where
    S: SecretStore + ?Sized,
{
    let owner_namespace = mangler
        .metadata
        .namespace
        .as_deref()
        .ok_or_else(|| ReconcilerError::Configuration("SecretMangler has no namespace".to_string()))?;
    let template = &mangler.spec.secret_template;

    let Some(existing) = store.get_secret(&template.namespace, &template.name).await? else {
        return create(mangler, owner_namespace, store).await;
    };
    warn_on_foreign_owner(mangler, &existing);

    let mode = template.cascade_mode();
    if mode == CascadeMode::KeepNoAction {
        debug!("Secret exists and cascade mode is KeepNoAction, not syncing");
        return Ok(ReconcileOutcome::Frozen);
    }

    let resolved = match resolve(&template.mappings, owner_namespace, store, false).await {
        Ok(data) => data,
        Err(e) => return resolve_failure(e),
    };

    let previous = secret_data(&existing);
    let decision = cascade::decide(&previous, resolved, mode);
    if !decision.lost_keys.is_empty() {
        info!(
            lost_keys = ?decision.lost_keys,
            action = decision.action.as_str(),
            "Mappings no longer resolve"
        );
    }

    match decision.action {
        CascadeAction::NoAction => {
            debug!("Secret data has not changed");
            // Frozen lost keys are reported even though the Secret needs no write
            let last_action = if decision.lost_keys.is_empty() {
                mangler
                    .status
                    .as_ref()
                    .and_then(|status| status.last_action.as_deref())
            } else {
                Some(decision.last_action.as_str())
            };
            persist_status(mangler, store, next_status(mangler, true, last_action)).await?;
            Ok(ReconcileOutcome::Unchanged)
        }
        CascadeAction::Update => {
            let desired = materializer::build(template, decision.data, mangler)?;
            let secret = materializer::merge_onto(&existing, desired);
            store.update_secret(&secret).await?;
            info!(last_action = decision.last_action.as_str(), "Updated secret");

            persist_status(
                mangler,
                store,
                next_status(mangler, true, Some(decision.last_action.as_str())),
            )
            .await?;
            Ok(ReconcileOutcome::Updated {
                last_action: decision.last_action,
            })
        }
        CascadeAction::Delete => {
            match store.delete_secret(&template.namespace, &template.name).await {
                Ok(()) => info!(last_action = decision.last_action.as_str(), "Deleted secret"),
                Err(e) if e.is_not_found() => {
                    debug!("Secret was already gone");
                }
                Err(e) => return Err(e.into()),
            }

            persist_status(
                mangler,
                store,
                next_status(mangler, false, Some(decision.last_action.as_str())),
            )
            .await?;
            Ok(ReconcileOutcome::Deleted {
                last_action: decision.last_action,
            })
        }
    }
}

async fn create<S>(
    mangler: &SecretMangler,
    owner_namespace: &str,
    store: &S,
) -> Result<ReconcileOutcome, ReconcilerError>
where
    S: SecretStore + ?Sized,
{
    let template = &mangler.spec.secret_template;
    let data = match resolve(&template.mappings, owner_namespace, store, true).await {
        Ok(data) => data,
        Err(e) => return resolve_failure(e),
    };

    // An empty secret is never materialized
    if data.is_empty() {
        info!("No mapping resolved to a value, nothing to create");
        return Ok(ReconcileOutcome::NothingToCreate);
    }

    let secret = materializer::build(template, data, mangler)?;
    store.create_secret(&secret).await?;
    info!(keys = secret.data.as_ref().map_or(0, |d| d.len()), "Created secret");

    persist_status(
        mangler,
        store,
        next_status(mangler, true, Some(LastAction::Create.as_str())),
    )
    .await?;
    Ok(ReconcileOutcome::Created)
}

/// Resolution failures that are not store errors end the pass without touching status
fn resolve_failure(err: ResolveError) -> Result<ReconcileOutcome, ReconcilerError> {
    match err {
        ResolveError::MalformedReference { field, source } => Ok(ReconcileOutcome::InvalidMapping {
            field,
            reason: source.to_string(),
        }),
        ResolveError::SourceNotFound {
            namespace, name, ..
        } => Ok(ReconcileOutcome::SourceMissing { namespace, name }),
        ResolveError::Store(e) => Err(e.into()),
    }
}

/// Two SecretManglers targeting one Secret overwrite each other; make it visible
fn warn_on_foreign_owner(mangler: &SecretMangler, existing: &Secret) {
    let Some(uid) = mangler.metadata.uid.as_deref() else {
        return;
    };
    let controller = existing
        .metadata
        .owner_references
        .iter()
        .flatten()
        .find(|owner| owner.controller == Some(true));
    if let Some(owner) = controller {
        if owner.uid != uid {
            warn!(
                owner.kind = owner.kind.as_str(),
                owner.name = owner.name.as_str(),
                "Target secret is controlled by another object"
            );
        }
    }
}
