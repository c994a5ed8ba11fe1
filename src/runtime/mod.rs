//! # Runtime
//!
//! Controller runtime: initialization, the watch loop and its error policy,
//! shutdown handling, and the mapping from changed Secrets to the SecretManglers using them.

pub mod error_policy;
pub mod initialization;
pub mod references;
pub mod shutdown;
pub mod watch_loop;
