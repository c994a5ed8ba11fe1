//! # Secret Triggers
//!
//! Maps a changed Secret onto the SecretManglers that must be reconciled again.
//!
//! - `scan` mode walks the controller's SecretMangler cache on every event.
//! - `indexed` mode looks up a [`ReferenceIndex`] kept current by a separate
//!   SecretMangler watch.

use crate::config::IndexMode;
use crate::controller::indexer::{affected_templates, ReferenceIndex, TemplateRef};
use crate::crd::SecretMangler;
use crate::observability;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::{watcher, WatchStreamExt};
use std::collections::BTreeSet;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Strategy used by the Secret watch mapper
#[derive(Clone)]
pub enum ReferenceLookup {
    Scan(Store<SecretMangler>),
    Indexed(ReferenceIndex),
}

impl std::fmt::Debug for ReferenceLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceLookup::Scan(_) => f.write_str("ReferenceLookup::Scan"),
            ReferenceLookup::Indexed(index) => f
                .debug_tuple("ReferenceLookup::Indexed")
                .field(&index.len())
                .finish(),
        }
    }
}

impl ReferenceLookup {
    #[must_use]
    pub fn mode(&self) -> IndexMode {
        match self {
            ReferenceLookup::Scan(_) => IndexMode::Scan,
            ReferenceLookup::Indexed(_) => IndexMode::Indexed,
        }
    }

    /// SecretManglers referencing `secret`
    #[must_use]
    pub fn affected(&self, secret: &Secret) -> Vec<ObjectRef<SecretMangler>> {
        let (Some(namespace), Some(name)) = (
            secret.metadata.namespace.as_deref(),
            secret.metadata.name.as_deref(),
        ) else {
            return Vec::new();
        };

        let span = tracing::span!(
            tracing::Level::DEBUG,
            "controller.watch.secret_changed",
            secret.namespace = namespace,
            secret.name = name,
            mode = %self.mode()
        );
        let _guard = span.enter();

        let templates: BTreeSet<TemplateRef> = match self {
            ReferenceLookup::Scan(cache) => affected_templates(namespace, name, cache.state()),
            ReferenceLookup::Indexed(index) => index.lookup(namespace, name),
        };

        if !templates.is_empty() {
            debug!(affected = templates.len(), "watch.secret_changed.mapped");
            observability::metrics::increment_secret_triggers(templates.len());
        }

        templates
            .into_iter()
            .map(|template| ObjectRef::new(&template.name).within(&template.namespace))
            .collect()
    }
}

/// Apply one SecretMangler watch event to the index
///
/// A re-list (`Init` .. `InitDone`) is buffered and swapped in at once, so
/// SecretManglers deleted while the watch was down disappear from the index.
pub fn apply_index_event(
    index: &ReferenceIndex,
    relist: &mut Vec<SecretMangler>,
    event: watcher::Event<SecretMangler>,
) {
    match event {
        watcher::Event::Init => relist.clear(),
        watcher::Event::InitApply(mangler) => relist.push(mangler),
        watcher::Event::InitDone => {
            index.replace_all(relist.drain(..));
            info!(templates = index.len(), "Reference index rebuilt");
        }
        watcher::Event::Apply(mangler) => index.upsert(&mangler),
        watcher::Event::Delete(mangler) => {
            if let Some(template) = TemplateRef::from_mangler(&mangler) {
                index.remove(&template);
            }
        }
    }
    observability::metrics::set_indexed_templates(index.len());
}

/// Keep `index` current from a SecretMangler watch until the process exits
pub fn start_index_watch(api: Api<SecretMangler>, index: ReferenceIndex) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting SecretMangler watch for the reference index");
        let mut relist = Vec::new();
        let mut events = watcher(api, watcher::Config::default())
            .default_backoff()
            .boxed();

        while let Some(event) = events.next().await {
            match event {
                Ok(event) => apply_index_event(&index, &mut relist, event),
                Err(e) => warn!(error = %e, "Reference index watch error, retrying with backoff"),
            }
        }
        warn!("Reference index watch ended");
    })
}
