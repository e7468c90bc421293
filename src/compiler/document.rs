//! Parsing of the raw specification text into an immutable document.

use crate::compiler::CompileError;
use serde_json::{Map, Number, Value};

/// A parsed OpenAPI document.
///
/// Owned by a single compilation and never mutated after [`parse`](Self::parse).
/// All lookups (including `$ref` resolution) borrow from it.
#[derive(Debug, Clone)]
pub struct SpecificationDocument {
    root: Value,
}

impl SpecificationDocument {
    /// Parse JSON or YAML text.
    ///
    /// JSON is attempted first since it is the cheaper and stricter parser;
    /// anything it rejects is handed to the YAML parser, whose error is the
    /// one reported.
    pub fn parse(text: &str) -> Result<Self, CompileError> {
        if text.trim().is_empty() {
            return Err(CompileError::Parse("specification is empty".to_string()));
        }

        let root = match serde_json::from_str::<Value>(text) {
            Ok(value) => value,
            Err(json_err) => {
                let yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
                    tracing::debug!(json_error = %json_err, "JSON parse failed, YAML also failed");
                    CompileError::Parse(e.to_string())
                })?;
                yaml_to_json(yaml)
            }
        };

        Self::from_value(root)
    }

    /// Wrap an already-parsed value.
    pub fn from_value(root: Value) -> Result<Self, CompileError> {
        if !root.is_object() {
            return Err(CompileError::InvalidDocument(format!(
                "document root must be a mapping, found {}",
                value_kind(&root)
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// URL of the first declared server, or an empty string.
    pub fn base_url(&self) -> &str {
        self.root
            .get("servers")
            .and_then(|s| s.as_array())
            .and_then(|servers| servers.first())
            .and_then(|server| server.get("url"))
            .and_then(|url| url.as_str())
            .unwrap_or("")
    }

    /// The `paths` mapping, if the document declares one.
    pub fn paths(&self) -> Option<&Map<String, Value>> {
        self.root.get("paths").and_then(|p| p.as_object())
    }

    pub fn title(&self) -> &str {
        self.info_str("title")
    }

    pub fn version(&self) -> &str {
        self.info_str("version")
    }

    fn info_str(&self, key: &str) -> &str {
        self.root
            .get("info")
            .and_then(|info| info.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }
}

/// Convert a YAML tree into a JSON tree.
///
/// OpenAPI YAML routinely uses integer mapping keys (`200:` under
/// `responses`), which JSON cannot represent, so keys are stringified.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => yaml_number(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(yaml_key(key), yaml_to_json(value));
            }
            Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        other => yaml_to_json(other).to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_document() {
        let doc = SpecificationDocument::parse(
            r#"{"openapi":"3.0.0","servers":[{"url":"https://api.example.com"}],"paths":{}}"#,
        )
        .unwrap();

        assert_eq!(doc.base_url(), "https://api.example.com");
        assert!(doc.paths().unwrap().is_empty());
    }

    #[test]
    fn test_parse_yaml_document() {
        let doc = SpecificationDocument::parse(
            r#"
openapi: "3.0.0"
info:
  title: Widgets
  version: "2.1"
paths:
  /widgets:
    get:
      responses:
        200:
          description: OK
"#,
        )
        .unwrap();

        assert_eq!(doc.title(), "Widgets");
        assert_eq!(doc.version(), "2.1");
        assert_eq!(doc.base_url(), "");
        let responses = doc
            .root()
            .pointer("/paths/~1widgets/get/responses")
            .unwrap();
        assert!(responses.get("200").is_some());
    }

    #[test]
    fn test_unparsable_text_is_parse_error() {
        let result = SpecificationDocument::parse("paths: [unclosed");
        assert!(matches!(result, Err(CompileError::Parse(_))));
    }

    #[test]
    fn test_empty_text_is_parse_error() {
        assert!(matches!(
            SpecificationDocument::parse("   \n"),
            Err(CompileError::Parse(_))
        ));
    }

    #[test]
    fn test_scalar_root_is_rejected() {
        let result = SpecificationDocument::parse("just a string");
        assert!(matches!(result, Err(CompileError::InvalidDocument(_))));
    }

    #[test]
    fn test_missing_paths_is_none() {
        let doc = SpecificationDocument::parse("openapi: 3.0.0").unwrap();
        assert!(doc.paths().is_none());
    }
}
