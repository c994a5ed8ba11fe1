//! # Status Updates
//!
//! Builds and persists the status of a SecretMangler.

use crate::controller::store::{SecretStore, StoreError};
use crate::crd::{SecretMangler, SecretManglerStatus};
use tracing::debug;

/// Status after a successful pass
#[must_use]
pub fn next_status(
    mangler: &SecretMangler,
    secret_created: bool,
    last_action: Option<&str>,
) -> SecretManglerStatus {
    SecretManglerStatus {
        secret_created,
        last_action: last_action.map(str::to_string),
        observed_generation: mangler.metadata.generation,
    }
}

/// Write `status` unless the SecretMangler already reports it
///
/// Skipping identical writes avoids a watch event per pass. Returns whether a
/// write happened.
pub async fn persist_status<S>(
    mangler: &SecretMangler,
    store: &S,
    status: SecretManglerStatus,
) -> Result<bool, StoreError>
where
    S: SecretStore + ?Sized,
{
    if mangler.status.as_ref() == Some(&status) {
        debug!(
            secret_created = status.secret_created,
            last_action = status.last_action.as_deref().unwrap_or("none"),
            "Skipping status update - status unchanged"
        );
        return Ok(false);
    }

    store.update_status(mangler, &status).await?;
    Ok(true)
}
