//! Schema translation.
//!
//! [`SchemaNode`] is the declarative OpenAPI schema as a sum type.
//! [`RuntimeSchema`] is what tools carry: it validates argument values
//! and serializes to JSON Schema for the agent runtime.
//!
//! Translation never fails. Anything it cannot understand (a dangling
//! `$ref`, a cycle, a schema nested too deeply) becomes [`SchemaType::Any`]
//! and a diagnostic is recorded.

use crate::compiler::diagnostics::{codes, Diagnostics};
use crate::compiler::resolver::{reference_of, ResolveError, Resolver};
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

// ============================================================================
// Declarative schema
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub description: Option<String>,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Reference(String),
    String {
        format: Option<String>,
        choices: Option<Vec<String>>,
    },
    Number,
    Integer,
    Boolean,
    Array {
        items: Option<Box<SchemaNode>>,
    },
    Object {
        properties: Option<BTreeMap<String, SchemaNode>>,
        required: BTreeSet<String>,
    },
    /// No usable type information: composition keywords (`oneOf`,
    /// `anyOf`, `allOf`, `not`) without a concrete type, or no schema at all.
    Unconstrained,
}

impl SchemaNode {
    /// Build a node from its JSON form. Non-object input yields an
    /// untyped object node.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::untyped();
        };

        let description = obj
            .get("description")
            .and_then(|d| d.as_str())
            .map(str::to_string);

        if let Some(reference) = reference_of(value) {
            return Self {
                kind: NodeKind::Reference(reference.to_string()),
                description,
                nullable: false,
            };
        }

        let (type_name, type_nullable) = declared_type(obj.get("type"));
        let nullable = type_nullable
            || obj
                .get("nullable")
                .and_then(|n| n.as_bool())
                .unwrap_or(false);

        let kind = match type_name {
            Some("string") => string_kind(obj),
            Some("number") => NodeKind::Number,
            Some("integer") => NodeKind::Integer,
            Some("boolean") => NodeKind::Boolean,
            Some("array") => NodeKind::Array {
                items: obj
                    .get("items")
                    .map(|items| Box::new(SchemaNode::from_value(items))),
            },
            None if obj.contains_key("enum") && !obj.contains_key("properties") => {
                if textual_enum(obj) {
                    string_kind(obj)
                } else {
                    NodeKind::Unconstrained
                }
            }
            None if is_composite(obj) => NodeKind::Unconstrained,
            _ => object_kind(obj),
        };

        Self {
            kind,
            description,
            nullable,
        }
    }

    /// A node that accepts any value.
    pub fn unconstrained() -> Self {
        Self {
            kind: NodeKind::Unconstrained,
            description: None,
            nullable: false,
        }
    }

    fn untyped() -> Self {
        Self {
            kind: NodeKind::Object {
                properties: None,
                required: BTreeSet::new(),
            },
            description: None,
            nullable: false,
        }
    }
}

/// Reads `type`, accepting both `"string"` and `["string", "null"]`.
fn declared_type(value: Option<&Value>) -> (Option<&str>, bool) {
    match value {
        Some(Value::String(s)) => (Some(s.as_str()), false),
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(|t| t.as_str()).collect();
            let nullable = names.contains(&"null");
            (names.into_iter().find(|t| *t != "null"), nullable)
        }
        _ => (None, false),
    }
}

/// True when every non-null `enum` member is a string.
fn textual_enum(obj: &Map<String, Value>) -> bool {
    obj.get("enum")
        .and_then(|e| e.as_array())
        .map(|values| values.iter().all(|v| v.is_string() || v.is_null()))
        .unwrap_or(false)
}

fn string_kind(obj: &Map<String, Value>) -> NodeKind {
    let choices = obj.get("enum").and_then(|e| e.as_array()).map(|values| {
        values
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    });

    NodeKind::String {
        format: obj
            .get("format")
            .and_then(|f| f.as_str())
            .map(str::to_string),
        choices,
    }
}

fn object_kind(obj: &Map<String, Value>) -> NodeKind {
    let properties = obj.get("properties").and_then(|p| p.as_object()).map(|props| {
        props
            .iter()
            .map(|(name, schema)| (name.clone(), SchemaNode::from_value(schema)))
            .collect()
    });

    let required = obj
        .get("required")
        .and_then(|r| r.as_array())
        .map(|names| {
            names
                .iter()
                .filter_map(|n| n.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    NodeKind::Object {
        properties,
        required,
    }
}

fn is_composite(obj: &Map<String, Value>) -> bool {
    ["oneOf", "anyOf", "allOf", "not"]
        .iter()
        .any(|key| obj.contains_key(*key))
}

// ============================================================================
// Runtime schema
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSchema {
    pub kind: SchemaType,
    /// May be absent (or null) at its position.
    pub optional: bool,
    pub nullable: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    Any,
    /// `format` is descriptive only and is not enforced.
    String { format: Option<String> },
    /// Closed set of string literals.
    Literal(Vec<String>),
    Number,
    Boolean,
    List(Box<RuntimeSchema>),
    Struct(BTreeMap<String, RuntimeSchema>),
    /// Any object, any values.
    Record,
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl RuntimeSchema {
    pub fn new(kind: SchemaType) -> Self {
        Self {
            kind,
            optional: false,
            nullable: false,
            description: None,
        }
    }

    pub fn any() -> Self {
        Self::new(SchemaType::Any)
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        if description.is_some() {
            self.description = description;
        }
        self
    }

    /// Fields of a struct schema, if this is one.
    pub fn fields(&self) -> Option<&BTreeMap<String, RuntimeSchema>> {
        match &self.kind {
            SchemaType::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Validate a value, collecting every violation.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        self.check(Some(value), "$", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn check(&self, value: Option<&Value>, path: &str, out: &mut Vec<Violation>) {
        let value = match value {
            None if self.optional => return,
            None => {
                out.push(violation(path, "required value is missing"));
                return;
            }
            Some(Value::Null) if self.optional || self.nullable => return,
            Some(v) => v,
        };

        match &self.kind {
            SchemaType::Any => {}
            SchemaType::String { .. } => {
                if !value.is_string() {
                    out.push(type_violation(path, "string", value));
                }
            }
            SchemaType::Literal(choices) => match value.as_str() {
                Some(s) if choices.iter().any(|c| c == s) => {}
                _ => out.push(violation(
                    path,
                    format!("expected one of [{}], got {}", choices.join(", "), value),
                )),
            },
            SchemaType::Number => {
                if !value.is_number() {
                    out.push(type_violation(path, "number", value));
                }
            }
            SchemaType::Boolean => {
                if !value.is_boolean() {
                    out.push(type_violation(path, "boolean", value));
                }
            }
            SchemaType::List(items) => match value.as_array() {
                Some(values) => {
                    for (idx, item) in values.iter().enumerate() {
                        items.check(Some(item), &format!("{}[{}]", path, idx), out);
                    }
                }
                None => out.push(type_violation(path, "array", value)),
            },
            SchemaType::Struct(fields) => match value.as_object() {
                Some(obj) => {
                    for (name, field) in fields {
                        field.check(obj.get(name), &format!("{}.{}", path, name), out);
                    }
                }
                None => out.push(type_violation(path, "object", value)),
            },
            SchemaType::Record => {
                if !value.is_object() {
                    out.push(type_violation(path, "object", value));
                }
            }
        }
    }

    /// Render as JSON Schema.
    pub fn to_json_schema(&self) -> Value {
        let mut schema = match &self.kind {
            SchemaType::Any => json!({}),
            SchemaType::String { format } => match format {
                Some(format) => json!({ "type": "string", "format": format }),
                None => json!({ "type": "string" }),
            },
            SchemaType::Literal(choices) => json!({ "type": "string", "enum": choices }),
            SchemaType::Number => json!({ "type": "number" }),
            SchemaType::Boolean => json!({ "type": "boolean" }),
            SchemaType::List(items) => json!({ "type": "array", "items": items.to_json_schema() }),
            SchemaType::Struct(fields) => {
                let properties: Map<String, Value> = fields
                    .iter()
                    .map(|(name, field)| (name.clone(), field.to_json_schema()))
                    .collect();
                let required: Vec<&str> = fields
                    .iter()
                    .filter(|(_, field)| !field.optional)
                    .map(|(name, _)| name.as_str())
                    .collect();

                let mut schema = json!({ "type": "object", "properties": properties });
                if !required.is_empty() {
                    schema["required"] = json!(required);
                }
                schema
            }
            SchemaType::Record => json!({ "type": "object", "additionalProperties": true }),
        };

        if let Some(description) = &self.description {
            schema["description"] = json!(description);
        }
        if self.nullable {
            schema["nullable"] = json!(true);
        }
        schema
    }
}

impl Serialize for RuntimeSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_schema().serialize(serializer)
    }
}

fn violation(path: &str, message: impl Into<String>) -> Violation {
    Violation {
        path: path.to_string(),
        message: message.into(),
    }
}

fn type_violation(path: &str, expected: &str, got: &Value) -> Violation {
    violation(path, format!("expected {}, got {}", expected, got))
}

// ============================================================================
// Translator
// ============================================================================

/// Default bound on schema nesting, references included.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default bound on schema nodes produced by one translator.
pub const DEFAULT_MAX_NODES: usize = 200_000;

/// A fully translated reference target and the nodes it accounts for.
struct CachedSchema {
    schema: RuntimeSchema,
    nodes: usize,
}

/// Recursive [`SchemaNode`] to [`RuntimeSchema`] translation.
///
/// Holds the stack of references currently being expanded so that
/// self-referencing schemas terminate. Each reference target is translated
/// once and reused afterwards. Every produced node, reused ones included,
/// counts against `max_nodes`; past that budget schemas degrade to Any.
pub struct Translator<'doc, 'a> {
    resolver: Resolver<'doc>,
    diagnostics: &'a mut Diagnostics,
    max_depth: usize,
    max_nodes: usize,
    nodes: usize,
    /// Bumped whenever a schema is cut short (cycle, depth or size).
    /// Translations that saw a cut depend on where they were reached and
    /// are not cached.
    cuts: usize,
    size_reported: bool,
    active: Vec<String>,
    cache: HashMap<String, CachedSchema>,
}

impl<'doc, 'a> Translator<'doc, 'a> {
    pub fn new(resolver: Resolver<'doc>, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            resolver,
            diagnostics,
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            nodes: 0,
            cuts: 0,
            size_reported: false,
            active: Vec::new(),
            cache: HashMap::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// Nodes produced so far.
    pub fn node_count(&self) -> usize {
        self.nodes
    }

    pub fn resolver(&self) -> Resolver<'doc> {
        self.resolver
    }

    pub fn diagnostics(&mut self) -> &mut Diagnostics {
        &mut *self.diagnostics
    }

    /// Translate a schema given in JSON form.
    pub fn translate_value(&mut self, value: &Value, name: &str, required: bool) -> RuntimeSchema {
        self.translate(&SchemaNode::from_value(value), name, required)
    }

    pub fn translate(&mut self, node: &SchemaNode, name: &str, required: bool) -> RuntimeSchema {
        self.translate_at(node, name, required, 0)
    }

    fn translate_at(
        &mut self,
        node: &SchemaNode,
        name: &str,
        required: bool,
        depth: usize,
    ) -> RuntimeSchema {
        if depth > self.max_depth {
            self.diagnostics.warn(
                codes::DEPTH_LIMIT,
                format!(
                    "schema '{}' nests deeper than {} levels, accepting any value",
                    name, self.max_depth
                ),
            );
            self.cuts += 1;
            return RuntimeSchema::any().with_optional(!required);
        }

        if self.over_budget(1, name) {
            return RuntimeSchema::any().with_optional(!required);
        }
        self.nodes += 1;

        let kind = match &node.kind {
            NodeKind::Reference(reference) => {
                return self
                    .follow_reference(reference, name, required, depth)
                    .with_description(node.description.clone());
            }
            NodeKind::String { format, choices } => match choices {
                Some(choices) if !choices.is_empty() => SchemaType::Literal(choices.clone()),
                _ => SchemaType::String {
                    format: format.clone(),
                },
            },
            NodeKind::Number | NodeKind::Integer => SchemaType::Number,
            NodeKind::Boolean => SchemaType::Boolean,
            NodeKind::Array { items } => {
                let items = match items {
                    Some(items) => self.translate_at(items, name, true, depth + 1),
                    None => RuntimeSchema::any(),
                };
                SchemaType::List(Box::new(items))
            }
            NodeKind::Object {
                properties: Some(properties),
                required: required_fields,
            } => {
                let fields = properties
                    .iter()
                    .map(|(field, child)| {
                        let schema = self.translate_at(
                            child,
                            field,
                            required_fields.contains(field),
                            depth + 1,
                        );
                        (field.clone(), schema)
                    })
                    .collect();
                SchemaType::Struct(fields)
            }
            NodeKind::Object {
                properties: None, ..
            } => SchemaType::Record,
            NodeKind::Unconstrained => SchemaType::Any,
        };

        RuntimeSchema {
            kind,
            optional: !required,
            nullable: node.nullable,
            description: node.description.clone(),
        }
    }

    fn follow_reference(
        &mut self,
        reference: &str,
        name: &str,
        required: bool,
        depth: usize,
    ) -> RuntimeSchema {
        if self.active.iter().any(|r| r == reference) {
            self.diagnostics.warn(
                codes::CIRCULAR_REFERENCE,
                format!(
                    "'{}' refers back to {}, accepting any value",
                    name, reference
                ),
            );
            self.cuts += 1;
            return RuntimeSchema::any().with_optional(!required);
        }

        if let Some(cost) = self.cache.get(reference).map(|cached| cached.nodes) {
            if self.over_budget(cost, name) {
                return RuntimeSchema::any().with_optional(!required);
            }
            self.nodes += cost;
            if let Some(cached) = self.cache.get(reference) {
                return cached.schema.clone().with_optional(!required);
            }
        }

        let target = match self.resolver.resolve(reference) {
            Ok(target) => target,
            Err(ResolveError::External) => {
                self.diagnostics.warn(
                    codes::EXTERNAL_REFERENCE,
                    format!("'{}' uses unsupported reference {}", name, reference),
                );
                return RuntimeSchema::any().with_optional(!required);
            }
            Err(ResolveError::Missing) => {
                self.diagnostics.warn(
                    codes::UNRESOLVED_REFERENCE,
                    format!("'{}' refers to missing {}", name, reference),
                );
                return RuntimeSchema::any().with_optional(!required);
            }
        };

        let (nodes_before, cuts_before) = (self.nodes, self.cuts);
        self.active.push(reference.to_string());
        let schema = self.translate_at(&SchemaNode::from_value(target), name, required, depth + 1);
        self.active.pop();

        if self.cuts == cuts_before {
            self.cache.insert(
                reference.to_string(),
                CachedSchema {
                    schema: schema.clone(),
                    nodes: self.nodes - nodes_before,
                },
            );
        }
        schema
    }

    /// True when producing `cost` more nodes would exceed the budget. The
    /// first overrun is reported once per translator.
    fn over_budget(&mut self, cost: usize, name: &str) -> bool {
        if self.nodes.saturating_add(cost) <= self.max_nodes {
            return false;
        }
        if !self.size_reported {
            self.size_reported = true;
            self.diagnostics.warn(
                codes::SIZE_LIMIT,
                format!(
                    "schemas exceed {} nodes at '{}', accepting any value from here on",
                    self.max_nodes, name
                ),
            );
        }
        self.cuts += 1;
        true
    }
}
