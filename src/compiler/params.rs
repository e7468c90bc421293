//! Parameter collection and classification by location.

use crate::compiler::diagnostics::codes;
use crate::compiler::resolver::reference_of;
use crate::compiler::schema::{RuntimeSchema, SchemaNode, Translator};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Path,
    Query,
    Header,
}

impl Location {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
        }
    }
}

/// One declared operation parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: Location,
    pub required: bool,
    pub schema: SchemaNode,
    pub description: Option<String>,
}

impl ParameterDescriptor {
    /// Read a parameter object, resolving it first if it is a `$ref`.
    ///
    /// Returns `None` (after recording why) for parameters that cannot be
    /// routed: no name, or a location other than path/query/header.
    pub fn from_value(raw: &Value, translator: &mut Translator<'_, '_>) -> Option<Self> {
        let value = match reference_of(raw) {
            Some(reference) => translator.resolver().resolve_or_empty(reference),
            None => raw,
        };

        let Some(name) = value.get("name").and_then(|n| n.as_str()) else {
            let origin = reference_of(raw).unwrap_or("inline parameter");
            translator.diagnostics().warn(
                codes::INVALID_PARAMETER,
                format!("{} has no name, skipping", origin),
            );
            return None;
        };

        let declared_in = value.get("in").and_then(|l| l.as_str()).unwrap_or("");
        let Some(location) = Location::parse(declared_in) else {
            translator.diagnostics().warn(
                codes::UNSUPPORTED_LOCATION,
                format!(
                    "parameter '{}' is located in '{}', only path/query/header are routed",
                    name, declared_in
                ),
            );
            return None;
        };

        Some(Self {
            name: name.to_string(),
            location,
            required: value
                .get("required")
                .and_then(|r| r.as_bool())
                .unwrap_or(false),
            schema: value
                .get("schema")
                .map(SchemaNode::from_value)
                .unwrap_or_else(SchemaNode::unconstrained),
            description: value
                .get("description")
                .and_then(|d| d.as_str())
                .map(str::to_string),
        })
    }
}

/// Concatenate path-level and operation-level parameter lists.
///
/// Path-level entries come first. An operation-level entry with the same
/// (name, location) replaces the path-level one in place.
pub fn merge_parameters(
    path_level: Option<&Value>,
    operation_level: Option<&Value>,
    translator: &mut Translator<'_, '_>,
) -> Vec<ParameterDescriptor> {
    let mut merged: Vec<ParameterDescriptor> = Vec::new();

    for list in [path_level, operation_level].into_iter().flatten() {
        let Some(entries) = list.as_array() else {
            continue;
        };
        for raw in entries {
            let Some(param) = ParameterDescriptor::from_value(raw, translator) else {
                continue;
            };
            match merged
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                Some(existing) => *existing = param,
                None => merged.push(param),
            }
        }
    }

    merged
}

/// Parameters partitioned by location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedParameters {
    pub path: BTreeMap<String, RuntimeSchema>,
    pub query: BTreeMap<String, RuntimeSchema>,
    pub header: BTreeMap<String, RuntimeSchema>,
    pub required_path: Vec<String>,
    pub required_query: Vec<String>,
    pub required_header: Vec<String>,
}

/// Translate every parameter's schema and file it under its location.
pub fn classify(
    params: &[ParameterDescriptor],
    translator: &mut Translator<'_, '_>,
) -> ClassifiedParameters {
    let mut classified = ClassifiedParameters::default();

    for param in params {
        let schema = translator
            .translate(&param.schema, &param.name, param.required)
            .with_description(param.description.clone());

        let (bucket, required) = match param.location {
            Location::Path => (&mut classified.path, &mut classified.required_path),
            Location::Query => (&mut classified.query, &mut classified.required_query),
            Location::Header => (&mut classified.header, &mut classified.required_header),
        };

        if param.required {
            required.push(param.name.clone());
        }
        bucket.insert(param.name.clone(), schema);
    }

    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::diagnostics::Diagnostics;
    use crate::compiler::document::SpecificationDocument;
    use crate::compiler::resolver::Resolver;
    use crate::compiler::schema::SchemaType;
    use serde_json::json;

    fn document() -> SpecificationDocument {
        SpecificationDocument::from_value(json!({
            "components": {
                "parameters": {
                    "Limit": {
                        "name": "limit",
                        "in": "query",
                        "schema": { "type": "integer" }
                    }
                },
                "schemas": {
                    "Id": { "type": "string" }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_classify_by_location() {
        let doc = document();
        let mut diags = Diagnostics::new();
        let mut translator = Translator::new(Resolver::new(&doc), &mut diags);

        let ops = json!([
            { "name": "id", "in": "path", "required": true, "schema": { "$ref": "#/components/schemas/Id" } },
            { "name": "verbose", "in": "query", "schema": { "type": "boolean" } },
            { "name": "X-Trace", "in": "header", "required": true, "schema": { "type": "string" } },
            { "$ref": "#/components/parameters/Limit" }
        ]);
        let params = merge_parameters(None, Some(&ops), &mut translator);
        let classified = classify(&params, &mut translator);

        assert_eq!(classified.path["id"].kind, SchemaType::String { format: None });
        assert!(!classified.path["id"].optional);
        assert_eq!(classified.query["verbose"].kind, SchemaType::Boolean);
        assert!(classified.query["verbose"].optional);
        assert_eq!(classified.query["limit"].kind, SchemaType::Number);
        assert!(classified.header.contains_key("X-Trace"));
        assert_eq!(classified.required_path, vec!["id"]);
        assert!(classified.required_query.is_empty());
        assert_eq!(classified.required_header, vec!["X-Trace"]);
    }

    #[test]
    fn test_operation_level_overrides_path_level() {
        let doc = document();
        let mut diags = Diagnostics::new();
        let mut translator = Translator::new(Resolver::new(&doc), &mut diags);

        let path_level = json!([
            { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } },
            { "name": "page", "in": "query", "schema": { "type": "integer" } }
        ]);
        let op_level = json!([
            { "name": "id", "in": "path", "required": true, "schema": { "type": "integer" } }
        ]);

        let params = merge_parameters(Some(&path_level), Some(&op_level), &mut translator);

        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "id");
        assert_eq!(params[0].schema.kind, crate::compiler::schema::NodeKind::Integer);
        assert_eq!(params[1].name, "page");
    }

    #[test]
    fn test_same_name_different_location_is_kept() {
        let doc = document();
        let mut diags = Diagnostics::new();
        let mut translator = Translator::new(Resolver::new(&doc), &mut diags);

        let ops = json!([
            { "name": "token", "in": "query" },
            { "name": "token", "in": "header" }
        ]);

        let params = merge_parameters(None, Some(&ops), &mut translator);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_cookie_and_nameless_parameters_are_skipped() {
        let doc = document();
        let mut diags = Diagnostics::new();
        let params = {
            let mut translator = Translator::new(Resolver::new(&doc), &mut diags);
            let ops = json!([
                { "name": "session", "in": "cookie" },
                { "in": "query" },
                { "$ref": "#/components/parameters/Missing" }
            ]);
            merge_parameters(None, Some(&ops), &mut translator)
        };

        assert!(params.is_empty());
        assert!(diags.has_code(codes::UNSUPPORTED_LOCATION));
        assert!(diags.has_code(codes::INVALID_PARAMETER));
        assert_eq!(diags.len(), 3);
    }

    #[test]
    fn test_parameter_without_schema_accepts_anything() {
        let doc = document();
        let mut diags = Diagnostics::new();
        let mut translator = Translator::new(Resolver::new(&doc), &mut diags);

        let ops = json!([{ "name": "filter", "in": "query", "description": "Filter expr" }]);
        let params = merge_parameters(None, Some(&ops), &mut translator);
        let classified = classify(&params, &mut translator);

        assert_eq!(classified.query["filter"].kind, SchemaType::Any);
        assert_eq!(
            classified.query["filter"].description.as_deref(),
            Some("Filter expr")
        );
    }
}
