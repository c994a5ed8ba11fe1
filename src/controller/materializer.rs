//! # Materializer
//!
//! Builds the Secret object for a SecretMangler from resolved data, and
//! merges it onto an existing Secret for updates.
//! Pure construction, no store access.

use crate::controller::store::SecretData;
use crate::crd::{SecretMangler, SecretTemplate};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::Resource;
use thiserror::Error;

pub const SECRET_TYPE_OPAQUE: &str = "Opaque";

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("cannot set owner reference on secret {namespace}/{name}: {reason}")]
    Linkage {
        namespace: String,
        name: String,
        reason: String,
    },
}

/// Build the Secret described by `template`, holding `data` and owned by `owner`
///
/// # Errors
///
/// Returns [`MaterializeError::Linkage`] when the owner reference cannot be
/// attached: the owner has no name or uid yet, or lives in a different
/// namespace than the target (cross-namespace ownership is not allowed).
pub fn build(
    template: &SecretTemplate,
    data: SecretData,
    owner: &SecretMangler,
) -> Result<Secret, MaterializeError> {
    let linkage = |reason: String| MaterializeError::Linkage {
        namespace: template.namespace.clone(),
        name: template.name.clone(),
        reason,
    };

    let owner_namespace = owner.metadata.namespace.as_deref().unwrap_or_default();
    if owner_namespace != template.namespace {
        return Err(linkage(format!(
            "owner lives in namespace '{owner_namespace}', cross-namespace owner references are disallowed"
        )));
    }

    let owner_reference = owner
        .controller_owner_ref(&())
        .ok_or_else(|| linkage("owner has no name or uid".to_string()))?;

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(template.name.clone()),
            namespace: Some(template.namespace.clone()),
            annotations: template.annotation.clone().filter(|a| !a.is_empty()),
            owner_references: Some(vec![owner_reference]),
            ..ObjectMeta::default()
        },
        data: Some(
            data.into_iter()
                .map(|(key, value)| (key, ByteString(value)))
                .collect(),
        ),
        type_: Some(SECRET_TYPE_OPAQUE.to_string()),
        ..Secret::default()
    })
}

/// Carry `desired` onto the live `existing` Secret for a replace
///
/// Labels, annotations and non-controller owner references set by other
/// writers survive, with the template's annotations winning on key clashes.
/// The Secret keeps its type, which the API server does not allow to change,
/// and its `resourceVersion`, so concurrent writes surface as conflicts.
#[must_use]
pub fn merge_onto(existing: &Secret, desired: Secret) -> Secret {
    let Secret {
        metadata: desired_metadata,
        data,
        type_,
        ..
    } = desired;

    let mut metadata = existing.metadata.clone();
    // Unset keeps the server's field ownership as is
    metadata.managed_fields = None;

    let mut annotations = metadata.annotations.take().unwrap_or_default();
    annotations.extend(desired_metadata.annotations.unwrap_or_default());
    metadata.annotations = Some(annotations).filter(|a| !a.is_empty());

    let ours = desired_metadata.owner_references.unwrap_or_default();
    let mut owner_references: Vec<OwnerReference> = metadata
        .owner_references
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|owner| owner.controller != Some(true) && !ours.iter().any(|o| o.uid == owner.uid))
        .collect();
    owner_references.extend(ours);
    metadata.owner_references = Some(owner_references).filter(|o| !o.is_empty());

    Secret {
        metadata,
        data,
        type_: existing.type_.clone().or(type_),
        immutable: existing.immutable,
        ..Secret::default()
    }
}
