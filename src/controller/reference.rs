//! # Reference Expressions
//!
//! Parser for mapping values of a SecretMangler template.
//!
//! A mapping value is either a literal, stored verbatim, or a reference to
//! a field of another Secret:
//!
//! ```text
//! <[namespace/]secretName:field>
//! ```
//!
//! The namespace is optional. When it is omitted the reference resolves in
//! the namespace of the SecretMangler that contains it; that defaulting happens
//! at resolution time (see [`SecretReference::effective_namespace`]), never here.
//! There is no escaping, so `/` and `:` cannot appear in secret or field names.

use std::fmt;
use thiserror::Error;

/// A mapping value that could not be parsed as a reference
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed reference '{value}': {reason}")]
pub struct ReferenceError {
    pub value: String,
    pub reason: &'static str,
}

/// Parsed mapping value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingValue<'a> {
    /// Stored as bytes verbatim
    Literal(&'a str),
    /// Looked up in another Secret
    Reference(SecretReference),
}

/// Pointer to a single field of another Secret
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretReference {
    /// Explicit namespace, `None` when the expression omitted it
    pub namespace: Option<String>,
    pub secret_name: String,
    pub field: String,
}

impl SecretReference {
    /// Namespace the referenced Secret lives in
    ///
    /// Falls back to `owner_namespace` when the expression had no namespace.
    #[must_use]
    pub fn effective_namespace<'a>(&'a self, owner_namespace: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(owner_namespace)
    }

    /// Whether this reference points at `namespace/name`
    #[must_use]
    pub fn points_at(&self, owner_namespace: &str, namespace: &str, name: &str) -> bool {
        self.secret_name == name && self.effective_namespace(owner_namespace) == namespace
    }
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "<{}/{}:{}>", ns, self.secret_name, self.field),
            None => write!(f, "<{}:{}>", self.secret_name, self.field),
        }
    }
}

/// A value is a reference candidate iff it is wrapped in `<` and `>`
#[must_use]
pub fn is_reference_candidate(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('<') && value.ends_with('>')
}

/// Parse a mapping value
///
/// # Errors
///
/// Returns [`ReferenceError`] when the value is wrapped in `<...>` but does
/// not contain both a secret name and a field name.
pub fn parse(value: &str) -> Result<MappingValue<'_>, ReferenceError> {
    if !is_reference_candidate(value) {
        return Ok(MappingValue::Literal(value));
    }

    let malformed = |reason| ReferenceError {
        value: value.to_string(),
        reason,
    };

    let inner = &value[1..value.len() - 1];

    let (namespace, rest) = match inner.split_once('/') {
        Some((ns, rest)) => {
            let ns = (!ns.is_empty()).then(|| ns.to_string());
            (ns, rest)
        }
        None => (None, inner),
    };

    let (secret_name, field) = rest
        .split_once(':')
        .ok_or_else(|| malformed("expected secretName:field"))?;

    if secret_name.is_empty() {
        return Err(malformed("secret name is empty"));
    }
    if field.is_empty() {
        return Err(malformed("field name is empty"));
    }
    if secret_name.contains('/') || field.contains(['/', ':']) {
        return Err(malformed("'/' and ':' are not allowed in secret or field names"));
    }

    Ok(MappingValue::Reference(SecretReference {
        namespace,
        secret_name: secret_name.to_string(),
        field: field.to_string(),
    }))
}

/// Parse a mapping value and keep only references
///
/// Literals and malformed values yield `None`.
#[must_use]
pub fn parse_reference(value: &str) -> Option<SecretReference> {
    match parse(value) {
        Ok(MappingValue::Reference(reference)) => Some(reference),
        Ok(MappingValue::Literal(_)) | Err(_) => None,
    }
}
