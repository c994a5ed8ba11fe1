//! # Reverse-Dependency Index
//!
//! Maps a changed Secret to the SecretManglers that reference it, so they can
//! be reconciled again.
//!
//! Two variants:
//! - [`affected_templates`] scans every SecretMangler on each call. Nothing is
//!   cached, so it can never be stale.
//! - [`ReferenceIndex`] keeps `(namespace, secretName) -> SecretManglers` and is
//!   updated incrementally as SecretManglers are applied or deleted.
//!
//! Both resolve references without a namespace against the namespace of the
//! SecretMangler. Malformed mapping values and literals contribute nothing.

use crate::controller::reference::{parse_reference, SecretReference};
use crate::crd::SecretMangler;
use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Identity of a SecretMangler
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateRef {
    pub namespace: String,
    pub name: String,
}

impl TemplateRef {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// `None` when the object lacks a name or namespace
    #[must_use]
    pub fn from_mangler(mangler: &SecretMangler) -> Option<Self> {
        Some(Self::new(
            mangler.metadata.namespace.as_deref()?,
            mangler.metadata.name.as_deref()?,
        ))
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Identity of a source Secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SourceKey {
    namespace: String,
    name: String,
}

/// References of a SecretMangler together with its own namespace
fn references(mangler: &SecretMangler) -> impl Iterator<Item = SecretReference> + '_ {
    mangler
        .spec
        .secret_template
        .mappings
        .values()
        .filter_map(|value| parse_reference(value))
}

/// Whether any mapping of `mangler` points at `namespace/name`
#[must_use]
pub fn references_secret(mangler: &SecretMangler, namespace: &str, name: &str) -> bool {
    let Some(owner_namespace) = mangler.metadata.namespace.as_deref() else {
        return false;
    };
    references(mangler).any(|reference| reference.points_at(owner_namespace, namespace, name))
}

/// SecretManglers referencing the Secret `namespace/name`
///
/// Scans all `templates` from scratch.
pub fn affected_templates<I, T>(namespace: &str, name: &str, templates: I) -> BTreeSet<TemplateRef>
where
    I: IntoIterator<Item = T>,
    T: Borrow<SecretMangler>,
{
    templates
        .into_iter()
        .filter(|mangler| references_secret(mangler.borrow(), namespace, name))
        .filter_map(|mangler| TemplateRef::from_mangler(mangler.borrow()))
        .collect()
}

#[derive(Debug, Default)]
struct IndexState {
    by_source: HashMap<SourceKey, BTreeSet<TemplateRef>>,
    by_template: HashMap<TemplateRef, BTreeSet<SourceKey>>,
}

impl IndexState {
    fn sources_of(mangler: &SecretMangler, owner_namespace: &str) -> BTreeSet<SourceKey> {
        references(mangler)
            .map(|reference| SourceKey {
                namespace: reference.effective_namespace(owner_namespace).to_string(),
                name: reference.secret_name,
            })
            .collect()
    }

    fn remove(&mut self, template: &TemplateRef) {
        let Some(sources) = self.by_template.remove(template) else {
            return;
        };
        for source in sources {
            if let Some(templates) = self.by_source.get_mut(&source) {
                templates.remove(template);
                if templates.is_empty() {
                    self.by_source.remove(&source);
                }
            }
        }
    }

    fn upsert(&mut self, mangler: &SecretMangler) {
        let Some(template) = TemplateRef::from_mangler(mangler) else {
            return;
        };
        self.remove(&template);

        let sources = Self::sources_of(mangler, &template.namespace);
        if sources.is_empty() {
            return;
        }
        for source in &sources {
            self.by_source
                .entry(source.clone())
                .or_default()
                .insert(template.clone());
        }
        self.by_template.insert(template, sources);
    }
}

/// Incrementally maintained reverse-dependency index
///
/// Cheap to clone; clones share the same index.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    state: Arc<RwLock<IndexState>>,
}

impl ReferenceIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the references of a SecretMangler
    pub fn upsert(&self, mangler: &SecretMangler) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .upsert(mangler);
    }

    /// Drop every reference of a SecretMangler
    pub fn remove(&self, template: &TemplateRef) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(template);
    }

    /// Rebuild the index from a full listing
    pub fn replace_all<I, T>(&self, templates: I)
    where
        I: IntoIterator<Item = T>,
        T: Borrow<SecretMangler>,
    {
        let mut fresh = IndexState::default();
        for mangler in templates {
            fresh.upsert(mangler.borrow());
        }
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    /// SecretManglers referencing the Secret `namespace/name`
    #[must_use]
    pub fn lookup(&self, namespace: &str, name: &str) -> BTreeSet<TemplateRef> {
        let key = SourceKey {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_source
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of indexed SecretManglers
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_template
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
