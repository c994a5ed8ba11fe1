//! # Watch Loop
//!
//! Controller watch loop that monitors SecretMangler resources, the Secrets
//! they own and the Secrets they reference, and triggers reconciliation when
//! changes are detected.

use crate::config::IndexMode;
use crate::controller::indexer::ReferenceIndex;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::crd::SecretMangler;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use crate::runtime::references::{start_index_watch, ReferenceLookup};
use crate::runtime::shutdown::{listen_for_signals, Shutdown, StreamEnd};
use crate::server::ServerState;
use anyhow::Context;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::Client;
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controller watch loop
///
/// Sets up the Kubernetes controller to watch SecretMangler resources and
/// Secrets, and restarts it when the stream ends until shutdown is requested.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let config = Arc::clone(&reconciler.config);
    let restart_delay = config.watch_restart_delay_duration();

    let (manglers, secrets): (Api<SecretMangler>, Api<Secret>) = match &config.watch_namespace {
        Some(namespace) => {
            info!("Watching SecretManglers and Secrets in namespace {}", namespace);
            (
                Api::namespaced(client.clone(), namespace),
                Api::namespaced(client, namespace),
            )
        }
        None => {
            info!("Watching SecretManglers and Secrets in all namespaces");
            (Api::all(client.clone()), Api::all(client))
        }
    };

    // The index outlives controller restarts, its own watch keeps it current
    let index = match config.reference_index_mode {
        IndexMode::Indexed => {
            let index = ReferenceIndex::new();
            start_index_watch(manglers.clone(), index.clone());
            Some(index)
        }
        IndexMode::Scan => None,
    };

    let shutdown = Shutdown::new();
    listen_for_signals(Arc::clone(&shutdown))
        .context("Failed to install SIGINT/SIGTERM handlers")?;

    // Stop advertising readiness as soon as shutdown starts
    let readiness_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        readiness_shutdown.wait().await;
        server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if shutdown.is_requested() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop",
            index_mode = %config.reference_index_mode
        );

        let controller = Controller::new(manglers.clone(), watcher::Config::default().any_semantic())
            .with_config(
                controller::Config::default().concurrency(config.max_concurrent_reconciliations),
            );

        let lookup = match &index {
            Some(index) => ReferenceLookup::Indexed(index.clone()),
            None => ReferenceLookup::Scan(controller.store()),
        };
        debug!(lookup = ?lookup, "Secret trigger lookup configured");

        info!("Starting controller watch loop...");
        controller
            .owns(secrets.clone(), watcher::Config::default())
            .watches(secrets.clone(), watcher::Config::default(), move |secret| {
                lookup.affected(&secret)
            })
            .graceful_shutdown_on({
                let shutdown = Arc::clone(&shutdown);
                async move { shutdown.wait().await }
            })
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .filter_map(move |event| async move {
                match &event {
                    Ok((object, _action)) => {
                        debug!(resource = %object, "watch.event.success");
                        Some(event)
                    }
                    Err(e) => {
                        let error_string = format!("{e:?}");
                        handle_watch_stream_error(&error_string, restart_delay)
                            .await
                            .then_some(event)
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        match shutdown.after_stream_end() {
            StreamEnd::Exit => {
                info!("Shutdown requested, exiting watch loop");
                break;
            }
            StreamEnd::Restart => {
                warn!(
                    "Controller watch stream ended, restarting in {} seconds...",
                    restart_delay.as_secs()
                );
                tokio::select! {
                    () = tokio::time::sleep(restart_delay) => {}
                    () = shutdown.wait() => {}
                }
            }
        }
    }

    info!("Controller stopped gracefully");
    Ok(())
}
