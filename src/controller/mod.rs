//! # Controller
//!
//! Core controller modules for the Secret Mangler Controller.
//!
//! - `reference`: Parsing of `<[namespace/]secretName:field>` mapping values
//! - `resolver`: Resolution of mappings into secret data
//! - `cascade`: Decisions on lost or changed data per cascade mode
//! - `materializer`: Construction of the materialized Secret
//! - `reconciler`: Reconciliation of SecretMangler resources
//! - `indexer`: Reverse lookup from a changed Secret to the SecretManglers using it
//! - `store`: Store capabilities and their implementations
//! - `backoff`: Fibonacci backoff for failed reconciliations

pub mod backoff;
pub mod cascade;
pub mod indexer;
pub mod materializer;
pub mod reconciler;
pub mod reference;
pub mod resolver;
pub mod store;
