//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `secret_mangler_reconciliations_total` - Total number of reconciliations
//! - `secret_mangler_reconciliation_errors_total` - Total number of failed reconciliations
//! - `secret_mangler_reconciliation_duration_seconds` - Duration of reconciliations
//! - `secret_mangler_actions_total{action}` - Actions taken on materialized secrets
//! - `secret_mangler_malformed_references_total` - Templates rejected for a malformed reference
//! - `secret_mangler_source_missing_total` - Creations deferred because a source secret is missing
//! - `secret_mangler_secret_triggers_total` - SecretManglers re-queued because a referenced secret changed
//! - `secret_mangler_requeues_total{reason}` - Requeues by reason
//! - `secret_mangler_indexed_templates` - SecretManglers held in the reverse-dependency index

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_mangler_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_mangler_reconciliation_errors_total",
        "Total number of failed reconciliations",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "secret_mangler_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static ACTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "secret_mangler_actions_total",
            "Actions taken on materialized secrets",
        ),
        &["action"],
    )
    .expect("Failed to create ACTIONS_TOTAL metric - this should never happen")
});

static MALFORMED_REFERENCES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_mangler_malformed_references_total",
        "Total number of reconciliations aborted by a malformed reference",
    )
    .expect("Failed to create MALFORMED_REFERENCES_TOTAL metric - this should never happen")
});

static SOURCE_MISSING_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_mangler_source_missing_total",
        "Total number of creations deferred because a source secret is missing",
    )
    .expect("Failed to create SOURCE_MISSING_TOTAL metric - this should never happen")
});

static SECRET_TRIGGERS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_mangler_secret_triggers_total",
        "Total number of SecretManglers queued because a referenced secret changed",
    )
    .expect("Failed to create SECRET_TRIGGERS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("secret_mangler_requeues_total", "Requeues by reason"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static INDEXED_TEMPLATES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "secret_mangler_indexed_templates",
        "Number of SecretManglers held in the reverse-dependency index",
    )
    .expect("Failed to create INDEXED_TEMPLATES metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(ACTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MALFORMED_REFERENCES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SOURCE_MISSING_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRET_TRIGGERS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INDEXED_TEMPLATES.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

/// Count an action on a materialized secret (`Create`, `Update`, `Delete`, `NoAction`)
pub fn increment_actions(action: &str) {
    ACTIONS_TOTAL.with_label_values(&[action]).inc();
}

pub fn increment_malformed_references() {
    MALFORMED_REFERENCES_TOTAL.inc();
}

pub fn increment_source_missing() {
    SOURCE_MISSING_TOTAL.inc();
}

pub fn increment_secret_triggers(count: usize) {
    SECRET_TRIGGERS_TOTAL.inc_by(u64::try_from(count).unwrap_or(u64::MAX));
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn set_indexed_templates(count: usize) {
    INDEXED_TEMPLATES.set(i64::try_from(count).unwrap_or(i64::MAX));
}
