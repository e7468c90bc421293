//! Internal `$ref` lookup against the document being compiled.

use crate::compiler::document::SpecificationDocument;
use serde_json::Value;
use std::sync::OnceLock;

/// Outcome of a failed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Pointer does not start with `#/` (remote or relative file reference).
    External,
    /// Some segment of the pointer is absent from the document.
    Missing,
}

/// Borrowing resolver over one document.
///
/// The lookup is a single walk to the addressed node. If that node is
/// itself a `{"$ref": ...}`, the caller re-invokes resolution.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'doc> {
    root: &'doc Value,
}

impl<'doc> Resolver<'doc> {
    pub fn new(document: &'doc SpecificationDocument) -> Self {
        Self {
            root: document.root(),
        }
    }

    /// Follow `#/a/b/c` from the document root.
    pub fn resolve(&self, reference: &str) -> Result<&'doc Value, ResolveError> {
        let pointer = reference
            .strip_prefix('#')
            .filter(|p| p.starts_with('/'))
            .ok_or(ResolveError::External)?;

        // serde_json handles the ~0 / ~1 escapes
        self.root.pointer(pointer).ok_or(ResolveError::Missing)
    }

    /// Like [`resolve`](Self::resolve), but degrades to an empty object.
    pub fn resolve_or_empty(&self, reference: &str) -> &'doc Value {
        self.resolve(reference).unwrap_or_else(|_| empty_object())
    }
}

/// Returns the `$ref` string of a reference node.
pub fn reference_of(value: &Value) -> Option<&str> {
    value.get("$ref").and_then(|r| r.as_str())
}

fn empty_object() -> &'static Value {
    static EMPTY: OnceLock<Value> = OnceLock::new();
    EMPTY.get_or_init(|| Value::Object(Default::default()))
}
