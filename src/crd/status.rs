//! # SecretMangler Status
//!
//! Status types reported back on the SecretMangler resource.

use serde::{Deserialize, Serialize};

/// Status of the SecretMangler resource
///
/// `secretCreated` and `lastAction` are the only user-visible outcome of a
/// reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretManglerStatus {
    /// Whether the materialized Secret currently exists
    #[serde(default)]
    pub secret_created: bool,
    /// Label of the most recent action
    /// Values: Create, KeepNoAction, KeepLostSync, RemoveLostSync, CascadeDelete, NoData
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<String>,
    /// Generation of the spec that produced this status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
