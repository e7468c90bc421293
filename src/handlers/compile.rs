//! Specification compilation endpoint.
//!
//! The request body is the raw OpenAPI text (JSON or YAML). Compilation is
//! CPU-bound, so it runs on the blocking pool under a semaphore permit,
//! mirroring how every other CPU-heavy path in the service is scheduled.

use crate::compiler::{self, Diagnostic, ToolSet};
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// How long a request waits for a compilation permit before a 503.
const PERMIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub compilation_id: String,
    /// SHA-256 of the submitted text.
    pub digest: String,
    /// Tool name → `{ description, inputSchema }`.
    pub tools: Value,
    pub diagnostics: Vec<Diagnostic>,
}

/// POST /compile - Compile an OpenAPI document into agent tools.
///
/// # Flow
/// 1. Reject empty bodies
/// 2. Acquire a compilation permit (503 if the service is saturated)
/// 3. Parse and synthesize on the blocking pool, bounded by a timeout
/// 4. Return tool summaries plus per-operation diagnostics
pub async fn compile_handler(
    State(state): State<Arc<AppState>>,
    specification: String,
) -> Result<Json<CompileResponse>> {
    let compilation_id = Uuid::new_v4().to_string();
    let tool_set = compile_specification(&state, specification, &compilation_id).await?;

    let tools = serde_json::to_value(tool_set.summaries())
        .map_err(|e| AppError::InternalError(format!("Failed to serialize tools: {}", e)))?;

    Ok(Json(CompileResponse {
        compilation_id,
        digest: tool_set.digest,
        tools,
        diagnostics: tool_set.diagnostics,
    }))
}

/// Compile `specification` with the service's permits, timeout and options.
pub(crate) async fn compile_specification(
    state: &AppState,
    specification: String,
    compilation_id: &str,
) -> Result<ToolSet> {
    let start_time = Instant::now();

    if specification.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Specification cannot be empty".to_string(),
        ));
    }

    let spec_bytes = specification.len();

    // Acquire semaphore with timeout (503 if service overloaded)
    let _permit = tokio::time::timeout(PERMIT_TIMEOUT, state.semaphore.acquire())
        .await
        .map_err(|_| {
            AppError::ResourceError("Service temporarily overloaded, please retry".to_string())
        })?
        .map_err(|_| AppError::ResourceError("Semaphore closed".to_string()))?;

    let options = state.compile_options();
    let compile_timeout = Duration::from_secs(state.config.compile_timeout_secs);

    let result = tokio::time::timeout(
        compile_timeout,
        tokio::task::spawn_blocking(move || compiler::compile(&specification, &options)),
    )
    .await
    .map_err(|_| {
        AppError::ResourceError(format!(
            "Compilation timeout exceeded ({}s)",
            compile_timeout.as_secs()
        ))
    })?
    .map_err(|e| AppError::InternalError(format!("Task join error: {}", e)))?;

    metrics::counter!("compile_requests_total").increment(1);

    let tool_set = match result {
        Ok(tool_set) => tool_set,
        Err(e) => {
            metrics::counter!("compile_failures_total").increment(1);
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    tracing::info!(
        compilation_id,
        spec_bytes,
        tools = tool_set.len(),
        diagnostics = tool_set.diagnostics.len(),
        total_ms = elapsed.as_millis() as u64,
        "Compilation completed"
    );

    metrics::histogram!("compile_latency_ms").record(elapsed.as_millis() as f64);
    metrics::histogram!("compiled_tools").record(tool_set.len() as f64);

    Ok(tool_set)
}
