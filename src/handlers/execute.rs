use crate::compiler::synth::TOOL_NAME_PREFIX;
use crate::compiler::OutboundRequest;
use crate::error::{AppError, Result};
use crate::handlers::compile::compile_specification;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// Raw OpenAPI text (JSON or YAML)
    pub specification: String,
    /// Tool name (`ACTION: <operationId>`) or bare operationId
    pub tool: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// POST /execute - Build the outbound request for one tool invocation.
///
/// Arguments are validated against the tool's input schema before the
/// request is assembled. The request is returned, never sent.
pub async fn execute_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<OutboundRequest>> {
    if request.tool.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Tool name cannot be empty".to_string(),
        ));
    }

    let compilation_id = Uuid::new_v4().to_string();
    let tool_set = compile_specification(&state, request.specification, &compilation_id).await?;

    let prefixed = format!("{}{}", TOOL_NAME_PREFIX, request.tool);
    let tool = tool_set
        .get(&request.tool)
        .or_else(|| tool_set.get(&prefixed))
        .ok_or_else(|| AppError::NotFoundError(format!("Unknown tool '{}'", request.tool)))?;

    tool.validate(&Value::Object(request.arguments.clone()))
        .map_err(AppError::ArgumentError)?;

    let outbound = tool.execute(&request.arguments);

    tracing::debug!(
        compilation_id,
        tool = %tool.name,
        method = %outbound.method,
        url = %outbound.url,
        "Outbound request assembled"
    );
    metrics::counter!("execute_requests_total").increment(1);

    Ok(Json(outbound))
}
