//! # Error Policy
//!
//! Error handling and backoff for the controller watch loop.
//! Handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::SecretMangler;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource (`namespace/name`) so one failing
/// SecretMangler does not slow down the others. A successful pass resets it.
pub fn handle_reconciliation_error(
    obj: Arc<SecretMangler>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    observability::metrics::increment_reconciliation_errors();

    // Retrying faster will not fix the object itself
    if let ReconcilerError::Configuration(_) = error {
        let delay = ctx.config.reconciliation_error_requeue_duration();
        observability::metrics::increment_requeues_total("invalid-resource");
        return Action::requeue(delay);
    }

    let (delay, error_count) = ctx.next_backoff(&format!("{namespace}/{name}"));
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

    info!(
        backoff_secs = delay.as_secs(),
        error_count,
        next_retry = next_trigger_time.to_rfc3339().as_str(),
        "Retrying with Fibonacci backoff"
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}

/// How a watch stream error is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// RBAC revoked or token expired
    Unauthorized,
    /// Resource version expired, normal after restarts
    Expired,
    /// API server is throttling or reinitializing storage
    Throttled,
    /// Watched object or CRD missing
    NotFound,
    Other,
}

impl WatchErrorKind {
    /// Classify an error from its debug rendering
    #[must_use]
    pub fn classify(error_string: &str) -> Self {
        // 404 first: a plain-text 404 body surfaces as a serde error that also mentions WatchFailed
        let is_not_found = error_string.contains("ObjectNotFound")
            || error_string.contains("404")
            || error_string.contains("not found");
        if is_not_found {
            WatchErrorKind::NotFound
        } else if error_string.contains("401") || error_string.contains("Unauthorized") {
            WatchErrorKind::Unauthorized
        } else if error_string.contains("410")
            || error_string.contains("too old resource version")
            || error_string.contains("Expired")
            || error_string.contains("Gone")
        {
            WatchErrorKind::Expired
        } else if error_string.contains("429")
            || error_string.contains("storage is (re)initializing")
            || error_string.contains("TooManyRequests")
        {
            WatchErrorKind::Throttled
        } else {
            WatchErrorKind::Other
        }
    }
}

/// Handle a watch stream error
///
/// Returns `true` when the event should be kept in the stream and `false` when
/// it should be dropped after waiting.
pub async fn handle_watch_stream_error(error_string: &str, restart_delay: Duration) -> bool {
    let kind = WatchErrorKind::classify(error_string);
    warn!(error = error_string, kind = ?kind, "controller.watch.error");

    match kind {
        WatchErrorKind::Unauthorized => {
            error!("Watch authentication failed (401), check the ClusterRole and ClusterRoleBinding of the controller ServiceAccount");
            tokio::time::sleep(restart_delay).await;
            false
        }
        WatchErrorKind::Expired => {
            warn!("Watch resource version expired (410), the watch will re-list");
            false
        }
        WatchErrorKind::Throttled => {
            warn!(
                "API server throttling (429), backing off for {}s",
                restart_delay.as_secs()
            );
            tokio::time::sleep(restart_delay).await;
            false
        }
        WatchErrorKind::NotFound => {
            warn!("Watched resource not found (404), is the SecretMangler CRD installed?");
            true
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(restart_delay).await;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::controller::materializer::MaterializeError;
    use crate::controller::store::MemorySecretStore;
    use crate::crd::{SecretManglerSpec, SecretTemplate};

    #[test]
    fn test_classify_watch_errors() {
        assert_eq!(
            WatchErrorKind::classify("Api(ErrorResponse { code: 404, reason: \"NotFound\" })"),
            WatchErrorKind::NotFound
        );
        assert_eq!(
            WatchErrorKind::classify("WatchFailed(Unauthorized)"),
            WatchErrorKind::Unauthorized
        );
        assert_eq!(
            WatchErrorKind::classify("too old resource version: 12 (34)"),
            WatchErrorKind::Expired
        );
        assert_eq!(
            WatchErrorKind::classify("storage is (re)initializing"),
            WatchErrorKind::Throttled
        );
        assert_eq!(WatchErrorKind::classify("connection reset"), WatchErrorKind::Other);
    }

    #[test]
    fn test_reconciliation_errors_back_off_per_resource() {
        let ctx = Arc::new(Reconciler::new(
            Arc::new(MemorySecretStore::new()),
            ControllerConfig::default(),
        ));
        let mut mangler = SecretMangler::new(
            "m",
            SecretManglerSpec {
                secret_template: SecretTemplate::default(),
            },
        );
        mangler.metadata.namespace = Some("default".to_string());
        let mangler = Arc::new(mangler);
        let error = ReconcilerError::Linkage(MaterializeError::Linkage {
            namespace: "default".to_string(),
            name: "target".to_string(),
            reason: "owner has no name or uid".to_string(),
        });

        let delays: Vec<Action> = (0..3)
            .map(|_| handle_reconciliation_error(Arc::clone(&mangler), &error, Arc::clone(&ctx)))
            .collect();

        assert_eq!(
            delays,
            vec![
                Action::requeue(Duration::from_secs(5)),
                Action::requeue(Duration::from_secs(5)),
                Action::requeue(Duration::from_secs(10)),
            ]
        );
    }

    #[test]
    fn test_invalid_resource_requeues_at_fixed_interval() {
        let ctx = Arc::new(Reconciler::new(
            Arc::new(MemorySecretStore::new()),
            ControllerConfig::default(),
        ));
        let mangler = Arc::new(SecretMangler::new(
            "m",
            SecretManglerSpec {
                secret_template: SecretTemplate::default(),
            },
        ));
        let error = ReconcilerError::Configuration("SecretMangler has no namespace".to_string());

        for _ in 0..3 {
            assert_eq!(
                handle_reconciliation_error(Arc::clone(&mangler), &error, Arc::clone(&ctx)),
                Action::requeue(Duration::from_secs(60))
            );
        }
    }
}
