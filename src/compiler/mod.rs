//! OpenAPI to tool compiler.
//!
//! A compilation is a single pass over one document:
//! parse → walk `paths` → classify parameters → translate schemas
//! (resolving `$ref`s) → one [`Tool`] per operation.
//!
//! Each call to [`compile`] owns its document and diagnostics. Nothing is
//! shared between compilations, so concurrent requests cannot observe each
//! other's state.

pub mod diagnostics;
pub mod document;
pub mod params;
pub mod resolver;
pub mod schema;
pub mod synth;

pub use diagnostics::{Diagnostic, Diagnostics, Level};
pub use document::SpecificationDocument;
pub use params::{ClassifiedParameters, Location, ParameterDescriptor};
pub use resolver::Resolver;
pub use schema::{RuntimeSchema, SchemaNode, SchemaType, Translator, Violation};
pub use synth::{HttpMethod, OutboundRequest, Tool};

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

/// Fatal compilation failures. Everything else degrades to a diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Specification is not valid JSON or YAML: {0}")]
    Parse(String),

    #[error("Specification is not an OpenAPI document: {0}")]
    InvalidDocument(String),
}

/// Knobs for a single compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Maximum schema nesting (references included) before a schema
    /// degrades to accept-anything.
    pub max_schema_depth: usize,
    /// Maximum schema nodes produced across the whole document, shared
    /// references included, before further schemas accept anything.
    pub max_schema_nodes: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_schema_depth: schema::DEFAULT_MAX_DEPTH,
            max_schema_nodes: schema::DEFAULT_MAX_NODES,
        }
    }
}

/// The result of compiling one document.
#[derive(Debug, Clone)]
pub struct ToolSet {
    pub tools: BTreeMap<String, Tool>,
    pub diagnostics: Vec<Diagnostic>,
    /// SHA-256 of the source text, hex encoded.
    pub digest: String,
}

/// Serializable view of a tool: everything except `execute`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary<'a> {
    pub description: &'a str,
    pub input_schema: &'a RuntimeSchema,
}

impl ToolSet {
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn summaries(&self) -> BTreeMap<&str, ToolSummary<'_>> {
        self.tools
            .iter()
            .map(|(name, tool)| {
                (
                    name.as_str(),
                    ToolSummary {
                        description: &tool.description,
                        input_schema: &tool.input_schema,
                    },
                )
            })
            .collect()
    }
}

/// Compile specification text into a tool set.
///
/// # Errors
/// Only text that cannot be parsed at all (or whose root is not a mapping)
/// fails. Problems inside the document are reported in
/// [`ToolSet::diagnostics`].
pub fn compile(text: &str, options: &CompileOptions) -> Result<ToolSet, CompileError> {
    let document = SpecificationDocument::parse(text)?;
    let mut diagnostics = Diagnostics::new();

    let tools = synth::synthesize(&document, options, &mut diagnostics);

    tracing::info!(
        title = document.title(),
        version = document.version(),
        tools = tools.len(),
        warnings = diagnostics.warning_count(),
        "Specification compiled"
    );

    Ok(ToolSet {
        tools,
        diagnostics: diagnostics.into_vec(),
        digest: digest(text),
    })
}

fn digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(digest("abc"), digest("abc"));
        assert_ne!(digest("abc"), digest("abd"));
        assert_eq!(digest("").len(), 64);
    }

    #[test]
    fn test_compile_rejects_garbage() {
        let result = compile("{ not: [valid", &CompileOptions::default());
        assert!(matches!(result, Err(CompileError::Parse(_))));
    }

    #[test]
    fn test_summaries_serialize() {
        let set = compile(
            r#"{"paths":{"/ping":{"get":{"operationId":"ping","summary":"Ping"}}}}"#,
            &CompileOptions::default(),
        )
        .unwrap();

        let value = serde_json::to_value(set.summaries()).unwrap();
        assert_eq!(value["ACTION: ping"]["description"], "Ping");
        assert_eq!(value["ACTION: ping"]["inputSchema"]["type"], "object");
    }
}
