//! # Secret Mangler Controller
//!
//! A Kubernetes controller that materializes Secrets from `SecretMangler`
//! templates.
//!
//! ## Overview
//!
//! 1. **Watching SecretManglers** - Reconciles every `SecretMangler` on start and on change
//! 2. **Resolving mappings** - Each mapping is a literal value or a `<[namespace/]secretName:field>` reference
//! 3. **Materializing** - Creates the target Secret, owned by its `SecretMangler`
//! 4. **Cascading** - Applies the cascade mode when referenced Secrets change or disappear
//!
//! ## Usage
//!
//! See the [README.md](../README.md) for configuration and examples.

use anyhow::Result;
use secret_mangler_controller::runtime::initialization::initialize;
use secret_mangler_controller::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init.client, init.reconciler, init.server_state).await
}
