//! # SecretMangler Spec
//!
//! Main CRD specification types and the cascade mode enum.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// SecretMangler Custom Resource Definition
///
/// Describes a Secret that should be materialized from literal values and
/// fields of other Secrets.
///
/// # Example
///
/// ```yaml
/// apiVersion: secret-mangler.wreiner.at/v1alpha1
/// kind: SecretMangler
/// metadata:
///   name: base-mangler
///   namespace: default
/// spec:
///   secretTemplate:
///     apiVersion: v1
///     kind: Secret
///     name: new-secret
///     namespace: default
///     cascadeMode: KeepLostSync
///     mappings:
///       dynamicmapping: "<reference-secret:test>"
///       othernamespace: "<shared/reference-secret-2:test-2>"
///       fixedmapping: fixed-test
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "SecretMangler",
    group = "secret-mangler.wreiner.at",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::SecretManglerStatus",
    shortname = "sm",
    printcolumn = r#"{"name":"Target", "type":"string", "jsonPath":".spec.secretTemplate.name"}, {"name":"Created", "type":"boolean", "jsonPath":".status.secretCreated"}, {"name":"Last Action", "type":"string", "jsonPath":".status.lastAction"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecretManglerSpec {
    /// Template of the Secret to materialize
    pub secret_template: SecretTemplate,
}

/// Template of the materialized Secret
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplate {
    /// Name of the Secret to materialize
    pub name: String,
    /// Namespace of the Secret to materialize
    pub namespace: String,
    /// API version of the materialized object (descriptive only, always "v1")
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Kind of the materialized object (descriptive only, always "Secret")
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Free-form label (descriptive only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Annotations copied onto the materialized Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<BTreeMap<String, String>>,
    /// Target field name -> literal value or `<[namespace/]secretName:field>` reference
    #[serde(default)]
    pub mappings: HashMap<String, String>,
    /// Behaviour when referenced secrets change or disappear
    /// Defaults to KeepNoAction when not set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade_mode: Option<CascadeMode>,
}

impl SecretTemplate {
    /// Effective cascade mode, `KeepNoAction` when unset
    #[must_use]
    pub fn cascade_mode(&self) -> CascadeMode {
        self.cascade_mode.unwrap_or_default()
    }
}

/// Cascade mode of a SecretMangler
///
/// Decides what happens to an already materialized Secret when the
/// secrets it references change or disappear.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema,
)]
pub enum CascadeMode {
    /// Keep the Secret as it was created, never sync
    #[default]
    KeepNoAction,
    /// Sync referenced values; keep the last known value of lost sources
    KeepLostSync,
    /// Sync referenced values; drop fields of lost sources, delete the Secret once empty
    RemoveLostSync,
    /// Delete the whole Secret as soon as one source is lost
    CascadeDelete,
}

impl CascadeMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeMode::KeepNoAction => "KeepNoAction",
            CascadeMode::KeepLostSync => "KeepLostSync",
            CascadeMode::RemoveLostSync => "RemoveLostSync",
            CascadeMode::CascadeDelete => "CascadeDelete",
        }
    }
}

impl fmt::Display for CascadeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub fn default_api_version() -> String {
    "v1".to_string()
}

#[must_use]
pub fn default_kind() -> String {
    "Secret".to_string()
}
