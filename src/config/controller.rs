//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How SecretManglers affected by a changed Secret are found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexMode {
    /// Scan every cached SecretMangler on each Secret event
    #[default]
    Scan,
    /// Keep an incrementally maintained reverse-dependency index
    Indexed,
}

impl FromStr for IndexMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scan" => Ok(IndexMode::Scan),
            "indexed" | "index" => Ok(IndexMode::Indexed),
            other => Err(format!("unknown reference index mode '{other}'")),
        }
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexMode::Scan => "scan",
            IndexMode::Indexed => "indexed",
        })
    }
}

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
/// Invalid values fall back to the default.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Fixed requeue interval for SecretManglers rejected as invalid (seconds)
    pub reconciliation_error_requeue_secs: u64,
    /// Requeue interval while creation waits for a missing source Secret (seconds)
    pub source_missing_requeue_secs: u64,
    /// Fibonacci backoff start for failed reconciliations (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff cap for failed reconciliations (seconds)
    pub backoff_max_secs: u64,
    /// Delay before restarting the watch stream after it ends or fails (seconds)
    pub watch_restart_delay_secs: u64,
    /// Reverse-dependency lookup strategy
    pub reference_index_mode: IndexMode,
    /// Restrict watches to one namespace; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Maximum concurrent reconciliations, 0 means unbounded
    pub max_concurrent_reconciliations: u16,
    /// Log level for the controller's own targets (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            source_missing_requeue_secs: DEFAULT_SOURCE_MISSING_REQUEUE_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            reference_index_mode: IndexMode::default(),
            watch_namespace: None,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: DEFAULT_LOG_FORMAT.to_string(),
            log_enable_color: false,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        use crate::constants::*;
        let lookup = &lookup;
        Self {
            reconciliation_error_requeue_secs: var_or_default(
                lookup,
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            ),
            source_missing_requeue_secs: var_or_default(
                lookup,
                "SOURCE_MISSING_REQUEUE_SECS",
                DEFAULT_SOURCE_MISSING_REQUEUE_SECS,
            ),
            backoff_min_secs: var_or_default(lookup, "BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: var_or_default(lookup, "BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            watch_restart_delay_secs: var_or_default(
                lookup,
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            reference_index_mode: var_or_default(
                lookup,
                "REFERENCE_INDEX_MODE",
                IndexMode::default(),
            ),
            watch_namespace: lookup("WATCH_NAMESPACE")
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty()),
            max_concurrent_reconciliations: var_or_default(
                lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            log_level: var_or_default_str(lookup, "LOG_LEVEL", DEFAULT_LOG_LEVEL),
            log_format: var_or_default_str(lookup, "LOG_FORMAT", DEFAULT_LOG_FORMAT),
            log_enable_color: var_or_default_bool(lookup, "LOG_ENABLE_COLOR", false),
        }
    }

    #[must_use]
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    #[must_use]
    pub fn source_missing_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.source_missing_requeue_secs)
    }

    #[must_use]
    pub fn backoff_min_duration(&self) -> Duration {
        Duration::from_secs(self.backoff_min_secs)
    }

    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Tracing filter used when `RUST_LOG` is not set
    #[must_use]
    pub fn default_log_filter(&self) -> String {
        format!("secret_mangler_controller={}", self.log_level.to_lowercase())
    }

    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// How long to wait for the server to bind before giving up (seconds)
    pub startup_timeout_secs: u64,
    /// Readiness poll interval while waiting for the server (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        use crate::constants::*;
        let lookup = &lookup;
        Self {
            metrics_port: var_or_default(lookup, "METRICS_PORT", DEFAULT_METRICS_PORT),
            startup_timeout_secs: var_or_default(
                lookup,
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            poll_interval_ms: var_or_default(
                lookup,
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
        }
    }
}

/// Read a variable or return the default when it is unset or unparsable
fn var_or_default<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn var_or_default_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key)
        .map(|v| {
            let v_lower = v.trim().to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

fn var_or_default_str(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}
