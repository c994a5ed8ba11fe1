//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Defaults here can be overridden via environment variables, see
//! [`crate::config::ControllerConfig`].

/// Field manager name used for server-side patches
pub const FIELD_MANAGER: &str = "secret-mangler-controller";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default requeue interval when the backoff state cannot be read (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default requeue interval when creation waits for a missing source secret (seconds)
pub const DEFAULT_SOURCE_MISSING_REQUEUE_SECS: u64 = 30;

/// Default Fibonacci backoff start for reconciliation errors (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default Fibonacci backoff cap for reconciliation errors (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting the watch stream (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default cap on concurrently running reconciliations
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default log level for the controller's own targets when `RUST_LOG` is unset
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log output format (`json` or `text`)
pub const DEFAULT_LOG_FORMAT: &str = "json";
