use crate::compiler::{CompileError, Violation};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum AppError {
    #[error("Specification could not be compiled: {0}")]
    CompileError(#[from] CompileError),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Arguments do not match the tool input schema ({} violation(s))", .0.len())]
    ArgumentError(Vec<Violation>),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("Service temporarily unavailable: {0}")]
    ResourceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<Violation>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::CompileError(e) => {
                tracing::warn!(error = %e, "Specification rejected");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::ValidationError(msg) => {
                tracing::warn!(error = %msg, "Validation error");
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::ArgumentError(violations) => {
                tracing::warn!(violations = violations.len(), "Argument validation failed");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::NotFoundError(msg) => {
                tracing::warn!(error = %msg, "Not found");
                (StatusCode::NOT_FOUND, msg.clone())
            }
            AppError::ResourceError(msg) => {
                tracing::warn!(error = %msg, "Resource error");
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let violations = match self {
            AppError::ArgumentError(violations) => violations,
            _ => Vec::new(),
        };

        let body = Json(ErrorResponse {
            error: message,
            code: status.as_u16(),
            violations,
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
