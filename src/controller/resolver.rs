//! # Data Resolver
//!
//! Turns the mappings of a SecretMangler into the byte-map of the Secret to
//! materialize.
//!
//! - Literals are stored verbatim.
//! - References are looked up in the store, fresh on every call.
//! - A missing source Secret aborts resolution when `fail_fast` is set (first
//!   materialization) and is skipped otherwise (cascade handling decides later).
//! - A source Secret without the requested field is always skipped.
//! - A malformed reference aborts resolution before any lookup is made.

use crate::controller::reference::{self, MappingValue, ReferenceError, SecretReference};
use crate::controller::store::{secret_data, SecretData, SecretStore, StoreError};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("mapping '{field}' is malformed: {source}")]
    MalformedReference {
        field: String,
        #[source]
        source: ReferenceError,
    },
    #[error("mapping '{field}' references secret {namespace}/{name} which does not exist")]
    SourceNotFound {
        field: String,
        namespace: String,
        name: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

enum Resolution<'a> {
    Literal(&'a str),
    Reference(SecretReference),
}

/// Resolve `mappings` into a byte-map
///
/// `owner_namespace` is the namespace of the SecretMangler; references
/// without an explicit namespace resolve there.
///
/// # Errors
///
/// - [`ResolveError::MalformedReference`] for a malformed mapping value
/// - [`ResolveError::SourceNotFound`] for a missing source Secret when `fail_fast` is set
/// - [`ResolveError::Store`] when the store fails
pub async fn resolve<S>(
    mappings: &HashMap<String, String>,
    owner_namespace: &str,
    store: &S,
    fail_fast: bool,
) -> Result<SecretData, ResolveError>
where
    S: SecretStore + ?Sized,
{
    // Parse everything first so a configuration error never depends on source state
    let mut parsed: BTreeMap<&str, Resolution<'_>> = BTreeMap::new();
    for (field, value) in mappings {
        let resolution = match reference::parse(value) {
            Ok(MappingValue::Literal(literal)) => Resolution::Literal(literal),
            Ok(MappingValue::Reference(reference)) => Resolution::Reference(reference),
            Err(source) => {
                return Err(ResolveError::MalformedReference {
                    field: field.clone(),
                    source,
                })
            }
        };
        parsed.insert(field.as_str(), resolution);
    }

    // Sources read during this call; each Secret is fetched at most once per resolution
    let mut sources: HashMap<(String, String), Option<SecretData>> = HashMap::new();
    let mut data = SecretData::new();

    for (field, resolution) in parsed {
        let reference = match resolution {
            Resolution::Literal(literal) => {
                data.insert(field.to_string(), literal.as_bytes().to_vec());
                continue;
            }
            Resolution::Reference(reference) => reference,
        };

        let namespace = reference.effective_namespace(owner_namespace).to_string();
        let source_key = (namespace.clone(), reference.secret_name.clone());
        if !sources.contains_key(&source_key) {
            let fetched = store
                .get_secret(&namespace, &reference.secret_name)
                .await?
                .as_ref()
                .map(secret_data);
            sources.insert(source_key.clone(), fetched);
        }

        let Some(source) = &sources[&source_key] else {
            if fail_fast {
                return Err(ResolveError::SourceNotFound {
                    field: field.to_string(),
                    namespace,
                    name: reference.secret_name,
                });
            }
            debug!(
                mapping = field,
                source.namespace = namespace.as_str(),
                source.name = reference.secret_name.as_str(),
                "resolve.source_missing"
            );
            continue;
        };

        match source.get(&reference.field) {
            Some(value) => {
                data.insert(field.to_string(), value.clone());
            }
            None => debug!(
                mapping = field,
                source.namespace = namespace.as_str(),
                source.name = reference.secret_name.as_str(),
                source.field = reference.field.as_str(),
                "resolve.field_missing"
            ),
        }
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::store::MemorySecretStore;

    fn mappings(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_literal_only_mappings_resolve_verbatim() {
        let store = MemorySecretStore::new();
        let data = resolve(
            &mappings(&[("user", "admin"), ("empty", ""), ("angle", "<not closed")]),
            "default",
            &store,
            true,
        )
        .await
        .unwrap();

        assert_eq!(data.len(), 3);
        assert_eq!(data["user"], b"admin".to_vec());
        assert_eq!(data["empty"], Vec::<u8>::new());
        assert_eq!(data["angle"], b"<not closed".to_vec());
    }

    #[tokio::test]
    async fn test_reference_resolves_in_owner_namespace() {
        let store = MemorySecretStore::new();
        store
            .put_secret("owner-ns", "reference-secret", [("test", "ZGVydGVzdGRlcg==")])
            .await;
        store
            .put_secret("other-ns", "reference-secret", [("test", "wrong")])
            .await;

        let data = resolve(
            &mappings(&[
                ("dynamicmapping", "<reference-secret:test>"),
                ("fixedmapping", "fixed-test"),
            ]),
            "owner-ns",
            &store,
            true,
        )
        .await
        .unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(data["dynamicmapping"], b"ZGVydGVzdGRlcg==".to_vec());
        assert_eq!(data["fixedmapping"], b"fixed-test".to_vec());
    }

    #[tokio::test]
    async fn test_missing_source_fails_fast_or_is_skipped() {
        let store = MemorySecretStore::new();
        let m = mappings(&[("dynamic", "<gone/missing:test>"), ("fixed", "fixed-test")]);

        let err = resolve(&m, "default", &store, true).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::SourceNotFound { ref namespace, ref name, .. }
                if namespace == "gone" && name == "missing"
        ));

        let data = resolve(&m, "default", &store, false).await.unwrap();
        assert_eq!(data.len(), 1);
        assert!(data.contains_key("fixed"));
    }

    #[tokio::test]
    async fn test_missing_field_is_skipped_even_when_failing_fast() {
        let store = MemorySecretStore::new();
        store.put_secret("default", "source", [("present", "v")]).await;

        let data = resolve(
            &mappings(&[("a", "<source:present>"), ("b", "<source:absent>")]),
            "default",
            &store,
            true,
        )
        .await
        .unwrap();

        assert_eq!(data.len(), 1);
        assert_eq!(data["a"], b"v".to_vec());
    }

    #[tokio::test]
    async fn test_malformed_reference_aborts_before_lookups() {
        let store = MemorySecretStore::new();
        store
            .fail_on(crate::controller::store::StoreOperation::Get)
            .await;

        let err = resolve(
            &mappings(&[("good", "<source:field>"), ("bad", "<no-field>")]),
            "default",
            &store,
            false,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ResolveError::MalformedReference { ref field, .. } if field == "bad"
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_propagated() {
        let store = MemorySecretStore::new();
        store
            .fail_on(crate::controller::store::StoreOperation::Get)
            .await;

        let err = resolve(&mappings(&[("a", "<source:field>")]), "default", &store, false)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::Store(StoreError::Unavailable(_))));
    }
}
