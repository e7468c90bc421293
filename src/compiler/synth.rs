//! Tool synthesis: one invocable tool per declared operation.

use crate::compiler::diagnostics::{codes, Diagnostic, Diagnostics};
use crate::compiler::document::SpecificationDocument;
use crate::compiler::params::{classify, merge_parameters, ClassifiedParameters, Location};
use crate::compiler::resolver::{reference_of, Resolver};
use crate::compiler::schema::{RuntimeSchema, SchemaType, Translator, Violation};
use crate::compiler::CompileOptions;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Prefix of every synthesized tool name.
pub const TOOL_NAME_PREFIX: &str = "ACTION: ";

/// Argument key carrying the request body.
pub const BODY_ARGUMENT: &str = "body";

/// Body content types consulted, in order of preference.
const JSON_CONTENT_TYPES: [&str; 2] = ["application/json", "application/ld+json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Methods compiled into tools, in synthesis order.
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    /// Key of this method inside an OpenAPI path item.
    pub fn key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully assembled HTTP request description.
///
/// Produced by [`Tool::execute`]. Dispatching it is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRequest {
    pub url: String,
    pub method: HttpMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_params: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub description: String,
}

/// Where each argument goes when a tool is executed.
#[derive(Debug, Clone, PartialEq)]
struct RequestPlan {
    base_url: String,
    path_template: String,
    method: HttpMethod,
    /// Only required path parameters are substituted.
    path_params: Vec<String>,
    query_params: Vec<String>,
    header_params: Vec<String>,
    has_body: bool,
}

/// A compiled operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub name: String,
    pub operation_id: String,
    pub description: String,
    /// Struct schema over every path/query/header parameter plus `body`.
    pub input_schema: RuntimeSchema,
    plan: RequestPlan,
}

impl Tool {
    pub fn method(&self) -> HttpMethod {
        self.plan.method
    }

    pub fn path_template(&self) -> &str {
        &self.plan.path_template
    }

    /// Validate arguments against the input schema.
    pub fn validate(&self, arguments: &Value) -> Result<(), Vec<Violation>> {
        self.input_schema.validate(arguments)
    }

    /// Build the outbound request for a set of arguments.
    ///
    /// Arguments are not validated here. Missing arguments are omitted
    /// (query/header) or leave their `{placeholder}` in the URL (path).
    pub fn execute(&self, arguments: &Map<String, Value>) -> OutboundRequest {
        let plan = &self.plan;
        let mut path = plan.path_template.clone();

        for name in &plan.path_params {
            let placeholder = format!("{{{}}}", name);
            match arguments.get(name) {
                Some(value) => {
                    let encoded = urlencoding::encode(&stringify(value)).into_owned();
                    path = path.replace(&placeholder, &encoded);
                }
                None => {
                    tracing::warn!(
                        tool = %self.name,
                        parameter = %name,
                        "Required path parameter missing, placeholder left in URL"
                    );
                }
            }
        }

        let url = join_url(&plan.base_url, &path);
        let query_params = collect_present(&plan.query_params, arguments);
        let headers = collect_present(&plan.header_params, arguments);

        let body = if plan.has_body {
            arguments.get(BODY_ARGUMENT).cloned()
        } else {
            None
        };

        OutboundRequest {
            url,
            method: plan.method,
            headers,
            query_params,
            body,
            description: self.description.clone(),
        }
    }
}

/// `None` when nothing was declared, otherwise the declared names that
/// are present in `arguments`.
fn collect_present(
    declared: &[String],
    arguments: &Map<String, Value>,
) -> Option<BTreeMap<String, String>> {
    if declared.is_empty() {
        return None;
    }
    Some(
        declared
            .iter()
            .filter_map(|name| {
                arguments
                    .get(name)
                    .map(|value| (name.clone(), stringify(value)))
            })
            .collect(),
    )
}

/// Strings are used as-is; everything else as compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    if base_url.ends_with('/') && path.starts_with('/') {
        format!("{}{}", &base_url[..base_url.len() - 1], path)
    } else {
        format!("{}{}", base_url, path)
    }
}

/// Derive an operationId from method and path: `GET /widgets/{id}` becomes
/// `getWidgetsId`.
pub fn derive_operation_id(method: HttpMethod, path: &str) -> String {
    let mut id = method.key().to_string();
    for word in path.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            id.push(first.to_ascii_uppercase());
            id.extend(chars);
        }
    }
    id
}

/// Compile every (path, method) pair of the document into a tool,
/// keyed by tool name.
pub fn synthesize(
    document: &SpecificationDocument,
    options: &CompileOptions,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<String, Tool> {
    let mut tools = BTreeMap::new();

    let Some(paths) = document.paths() else {
        diagnostics.warn(codes::MISSING_PATHS, "document declares no 'paths'");
        return tools;
    };

    let base_url = document.base_url();
    if base_url.is_empty() {
        diagnostics.push(Diagnostic::info(
            codes::MISSING_SERVERS,
            "no servers declared, tool URLs are relative paths",
        ));
    }

    let mut translator = Translator::new(Resolver::new(document), diagnostics)
        .with_max_depth(options.max_schema_depth)
        .with_max_nodes(options.max_schema_nodes);

    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            translator.diagnostics().warn(
                codes::INVALID_OPERATION,
                format!("path item '{}' is not a mapping", path),
            );
            continue;
        };

        for method in HttpMethod::ALL {
            let Some(operation) = item.get(method.key()) else {
                continue;
            };
            if !operation.is_object() {
                translator.diagnostics().warn(
                    codes::INVALID_OPERATION,
                    format!("{} {} is not a mapping", method, path),
                );
                continue;
            }

            let tool = build_tool(
                &mut translator,
                base_url,
                path,
                method,
                item.get("parameters"),
                operation,
            );

            tracing::debug!(tool = %tool.name, method = %method, path = %path, "Synthesized tool");

            if let Some(previous) = tools.insert(tool.name.clone(), tool) {
                translator.diagnostics().push(
                    Diagnostic::warning(
                        codes::DUPLICATE_TOOL,
                        format!(
                            "operationId '{}' is declared more than once, {} {} replaced the earlier tool",
                            previous.operation_id, method, path
                        ),
                    )
                    .for_operation(previous.operation_id.clone()),
                );
            }
        }
    }

    tools
}

fn build_tool(
    translator: &mut Translator<'_, '_>,
    base_url: &str,
    path: &str,
    method: HttpMethod,
    path_parameters: Option<&Value>,
    operation: &Value,
) -> Tool {
    let operation_id = operation
        .get("operationId")
        .and_then(|id| id.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| derive_operation_id(method, path));

    translator.diagnostics().enter_operation(&operation_id);

    let params = merge_parameters(path_parameters, operation.get("parameters"), translator);
    let classified = classify(&params, translator);
    let body = request_body_schema(operation.get("requestBody"), translator);
    let input_schema = assemble_input_schema(&classified, body.as_ref(), translator);

    translator.diagnostics().leave_operation();

    let description = ["summary", "description"]
        .iter()
        .filter_map(|key| operation.get(*key).and_then(|v| v.as_str()))
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", method, path));

    let plan = RequestPlan {
        base_url: base_url.to_string(),
        path_template: path.to_string(),
        method,
        path_params: classified.required_path.clone(),
        query_params: classified.query.keys().cloned().collect(),
        header_params: classified.header.keys().cloned().collect(),
        has_body: body.is_some(),
    };

    Tool {
        name: format!("{}{}", TOOL_NAME_PREFIX, operation_id),
        operation_id,
        description,
        input_schema,
        plan,
    }
}

/// Translate the JSON schema of a request body, if one is declared.
fn request_body_schema(
    request_body: Option<&Value>,
    translator: &mut Translator<'_, '_>,
) -> Option<RuntimeSchema> {
    let raw = request_body?;
    let body = match reference_of(raw) {
        Some(reference) => match translator.resolver().resolve(reference) {
            Ok(body) => body,
            Err(_) => {
                translator.diagnostics().warn(
                    codes::UNRESOLVED_REFERENCE,
                    format!("request body refers to missing {}", reference),
                );
                return None;
            }
        },
        None => raw,
    };

    let required = body
        .get("required")
        .and_then(|r| r.as_bool())
        .unwrap_or(false);
    let content = body.get("content").and_then(|c| c.as_object())?;

    let Some(media) = JSON_CONTENT_TYPES
        .iter()
        .find_map(|content_type| content.get(*content_type))
    else {
        if !content.is_empty() {
            let declared: Vec<&str> = content.keys().map(String::as_str).collect();
            translator.diagnostics().warn(
                codes::UNSUPPORTED_CONTENT_TYPE,
                format!(
                    "request body content types [{}] are not JSON, body is not exposed",
                    declared.join(", ")
                ),
            );
        }
        return None;
    };

    let schema = media.get("schema")?;
    let description = body
        .get("description")
        .and_then(|d| d.as_str())
        .map(str::to_string);

    Some(
        translator
            .translate_value(schema, "requestBody", required)
            .with_description(description),
    )
}

/// Flatten the parameter buckets and body into one struct schema.
///
/// Fields are added path, query, header, then body; a later field whose
/// name is already taken is dropped from the schema and reported.
fn assemble_input_schema(
    classified: &ClassifiedParameters,
    body: Option<&RuntimeSchema>,
    translator: &mut Translator<'_, '_>,
) -> RuntimeSchema {
    let mut fields: BTreeMap<String, RuntimeSchema> = BTreeMap::new();
    let mut owners: BTreeMap<String, &'static str> = BTreeMap::new();

    let buckets = [
        (Location::Path.as_str(), &classified.path),
        (Location::Query.as_str(), &classified.query),
        (Location::Header.as_str(), &classified.header),
    ];
    let body_entry = body.map(|schema| (BODY_ARGUMENT.to_string(), schema.clone()));

    let entries = buckets
        .iter()
        .flat_map(|(location, bucket)| {
            bucket
                .iter()
                .map(move |(name, schema)| (*location, name.clone(), schema.clone()))
        })
        .chain(body_entry.map(|(name, schema)| ("body", name, schema)));

    for (location, name, schema) in entries {
        if let Some(owner) = owners.get(&name) {
            translator.diagnostics().warn(
                codes::PARAMETER_COLLISION,
                format!(
                    "'{}' is declared in both {} and {}, the {} declaration defines the input schema",
                    name, owner, location, owner
                ),
            );
            continue;
        }
        owners.insert(name.clone(), location);
        fields.insert(name, schema);
    }

    RuntimeSchema::new(SchemaType::Struct(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile_value(value: Value) -> (BTreeMap<String, Tool>, Diagnostics) {
        let doc = SpecificationDocument::from_value(value).unwrap();
        let mut diagnostics = Diagnostics::new();
        let tools = synthesize(&doc, &CompileOptions::default(), &mut diagnostics);
        (tools, diagnostics)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_derive_operation_id() {
        assert_eq!(derive_operation_id(HttpMethod::Get, "/widgets/{id}"), "getWidgetsId");
        assert_eq!(
            derive_operation_id(HttpMethod::Post, "/users/{user_id}/orders"),
            "postUsersUserIdOrders"
        );
        assert_eq!(derive_operation_id(HttpMethod::Delete, "/"), "delete");
    }

    #[test]
    fn test_path_substitution() {
        let (tools, _) = compile_value(json!({
            "servers": [{ "url": "https://api.example.com" }],
            "paths": {
                "/users/{id}/orders/{orderId}": {
                    "get": {
                        "operationId": "getOrder",
                        "parameters": [
                            { "name": "id", "in": "path", "required": true, "schema": { "type": "string" } },
                            { "name": "orderId", "in": "path", "required": true, "schema": { "type": "string" } }
                        ]
                    }
                }
            }
        }));

        let tool = &tools["ACTION: getOrder"];
        let request = tool.execute(&args(json!({ "id": "42", "orderId": "7" })));

        assert_eq!(request.url, "https://api.example.com/users/42/orders/7");
        assert!(!request.url.contains('{'));
        assert_eq!(request.method, HttpMethod::Get);
        assert!(request.query_params.is_none());
        assert!(request.headers.is_none());
    }

    #[test]
    fn test_substitution_leaves_server_url_alone() {
        let (tools, _) = compile_value(json!({
            "servers": [{ "url": "https://{region}.api.example.com" }],
            "paths": {
                "/regions/{region}": {
                    "get": {
                        "operationId": "getRegion",
                        "parameters": [
                            { "name": "region", "in": "path", "required": true }
                        ]
                    }
                }
            }
        }));

        let request = tools["ACTION: getRegion"].execute(&args(json!({ "region": "eu" })));
        assert_eq!(request.url, "https://{region}.api.example.com/regions/eu");
    }

    #[test]
    fn test_path_values_are_percent_encoded() {
        let (tools, _) = compile_value(json!({
            "paths": {
                "/files/{name}": {
                    "get": {
                        "parameters": [
                            { "name": "name", "in": "path", "required": true, "schema": { "type": "string" } }
                        ]
                    }
                }
            }
        }));

        let request = tools["ACTION: getFilesName"].execute(&args(json!({ "name": "a b/c" })));
        assert_eq!(request.url, "/files/a%20b%2Fc");
    }

    #[test]
    fn test_missing_path_parameter_leaves_placeholder() {
        let (tools, _) = compile_value(json!({
            "paths": {
                "/items/{id}": {
                    "delete": {
                        "parameters": [{ "name": "id", "in": "path", "required": true }]
                    }
                }
            }
        }));

        let request = tools["ACTION: deleteItemsId"].execute(&Map::new());
        assert_eq!(request.url, "/items/{id}");
        assert_eq!(request.method, HttpMethod::Delete);
    }

    #[test]
    fn test_query_and_header_routing() {
        let (tools, _) = compile_value(json!({
            "paths": {
                "/search": {
                    "get": {
                        "operationId": "search",
                        "parameters": [
                            { "name": "q", "in": "query", "required": true, "schema": { "type": "string" } },
                            { "name": "limit", "in": "query", "schema": { "type": "integer" } },
                            { "name": "tags", "in": "query", "schema": { "type": "array", "items": { "type": "string" } } },
                            { "name": "X-Api-Version", "in": "header", "schema": { "type": "string" } }
                        ]
                    }
                }
            }
        }));

        let request = tools["ACTION: search"].execute(&args(json!({
            "q": "rust",
            "tags": ["a", "b"]
        })));

        let query = request.query_params.unwrap();
        assert_eq!(query["q"], "rust");
        assert_eq!(query["tags"], r#"["a","b"]"#);
        assert!(!query.contains_key("limit"));
        assert_eq!(request.headers, Some(BTreeMap::new()));
    }

    #[test]
    fn test_body_is_attached_verbatim() {
        let (tools, _) = compile_value(json!({
            "paths": {
                "/widgets": {
                    "post": {
                        "operationId": "createWidget",
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "required": ["name"],
                                        "properties": { "name": { "type": "string" } }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }));

        let tool = &tools["ACTION: createWidget"];
        let fields = tool.input_schema.fields().unwrap();
        assert!(!fields[BODY_ARGUMENT].optional);

        let body = json!({ "name": "gear", "extra": 1 });
        let request = tool.execute(&args(json!({ "body": body.clone() })));
        assert_eq!(request.body, Some(body));
    }

    #[test]
    fn test_ld_json_body_and_unsupported_content() {
        let (tools, diags) = compile_value(json!({
            "paths": {
                "/things": {
                    "post": {
                        "operationId": "createThing",
                        "requestBody": {
                            "content": { "application/ld+json": { "schema": { "type": "object" } } }
                        }
                    },
                    "put": {
                        "operationId": "uploadThing",
                        "requestBody": {
                            "content": { "multipart/form-data": { "schema": { "type": "object" } } }
                        }
                    }
                }
            }
        }));

        assert!(tools["ACTION: createThing"]
            .input_schema
            .fields()
            .unwrap()
            .contains_key(BODY_ARGUMENT));
        assert!(tools["ACTION: uploadThing"].input_schema.fields().unwrap().is_empty());
        assert!(diags.has_code(codes::UNSUPPORTED_CONTENT_TYPE));

        let request = tools["ACTION: uploadThing"].execute(&args(json!({ "body": { "x": 1 } })));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_description_fallbacks() {
        let (tools, _) = compile_value(json!({
            "paths": {
                "/a": {
                    "get": { "operationId": "a1", "summary": "Summary", "description": "Desc" },
                    "post": { "operationId": "a2", "description": "Desc" },
                    "put": { "operationId": "a3" }
                }
            }
        }));

        assert_eq!(tools["ACTION: a1"].description, "Summary");
        assert_eq!(tools["ACTION: a2"].description, "Desc");
        assert_eq!(tools["ACTION: a3"].description, "PUT /a");
    }

    #[test]
    fn test_collision_keeps_first_location_and_routes_both() {
        let (tools, diags) = compile_value(json!({
            "paths": {
                "/x": {
                    "get": {
                        "operationId": "x",
                        "parameters": [
                            { "name": "token", "in": "query", "schema": { "type": "string" } },
                            { "name": "token", "in": "header", "schema": { "type": "integer" } }
                        ]
                    }
                }
            }
        }));

        let tool = &tools["ACTION: x"];
        let fields = tool.input_schema.fields().unwrap();
        assert_eq!(fields["token"].kind, SchemaType::String { format: None });
        assert!(diags.has_code(codes::PARAMETER_COLLISION));

        let request = tool.execute(&args(json!({ "token": "t" })));
        assert_eq!(request.query_params.unwrap()["token"], "t");
        assert_eq!(request.headers.unwrap()["token"], "t");
    }

    #[test]
    fn test_duplicate_operation_id_is_reported() {
        let (tools, diags) = compile_value(json!({
            "paths": {
                "/a": { "get": { "operationId": "same" } },
                "/b": { "get": { "operationId": "same" } }
            }
        }));

        assert_eq!(tools.len(), 1);
        assert_eq!(tools["ACTION: same"].path_template(), "/b");
        assert!(diags.has_code(codes::DUPLICATE_TOOL));
    }

    #[test]
    fn test_non_method_keys_are_ignored() {
        let (tools, diags) = compile_value(json!({
            "paths": {
                "/a": {
                    "summary": "path summary",
                    "parameters": [],
                    "options": { "operationId": "opts" },
                    "head": { "operationId": "head" },
                    "get": { "operationId": "getA" }
                }
            }
        }));

        assert_eq!(tools.len(), 1);
        assert!(tools.contains_key("ACTION: getA"));
        assert_eq!(diags.warning_count(), 0);
        assert!(diags.has_code(codes::MISSING_SERVERS));
    }

    #[test]
    fn test_missing_paths_is_a_warning() {
        let (tools, diags) = compile_value(json!({ "openapi": "3.0.0" }));
        assert!(tools.is_empty());
        assert!(diags.has_code(codes::MISSING_PATHS));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        assert_eq!(join_url("https://h/", "/p"), "https://h/p");
        assert_eq!(join_url("https://h/v1", "/p"), "https://h/v1/p");
        assert_eq!(join_url("", "/p"), "/p");
    }
}
