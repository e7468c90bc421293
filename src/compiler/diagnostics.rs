//! Non-fatal findings collected while compiling a document.
//!
//! Nothing recorded here aborts a compilation. Every degraded decision
//! (an unresolved `$ref`, a skipped cookie parameter, a colliding argument
//! name) is written down so callers can see why a tool looks the way it does.

use serde::Serialize;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
}

/// Stable diagnostic codes.
pub mod codes {
    pub const MISSING_PATHS: &str = "missing_paths";
    pub const MISSING_SERVERS: &str = "missing_servers";
    pub const UNRESOLVED_REFERENCE: &str = "unresolved_reference";
    pub const EXTERNAL_REFERENCE: &str = "external_reference";
    pub const CIRCULAR_REFERENCE: &str = "circular_reference";
    pub const DEPTH_LIMIT: &str = "depth_limit";
    pub const SIZE_LIMIT: &str = "size_limit";
    pub const UNSUPPORTED_LOCATION: &str = "unsupported_location";
    pub const INVALID_PARAMETER: &str = "invalid_parameter";
    pub const UNSUPPORTED_CONTENT_TYPE: &str = "unsupported_content_type";
    pub const PARAMETER_COLLISION: &str = "parameter_collision";
    pub const DUPLICATE_TOOL: &str = "duplicate_tool";
    pub const INVALID_OPERATION: &str = "invalid_operation";
}

/// A structured compilation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: Level,
    pub code: &'static str,
    pub message: String,
    /// operationId of the operation being compiled, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl Diagnostic {
    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            code,
            message: message.into(),
            operation: None,
        }
    }

    pub fn info(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            code,
            message: message.into(),
            operation: None,
        }
    }

    pub fn for_operation(mut self, operation_id: impl Into<String>) -> Self {
        self.operation = Some(operation_id.into());
        self
    }
}

/// Ordered collection of diagnostics for one compilation.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    /// Attached to every diagnostic pushed while set.
    operation: Option<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.operation.is_none() {
            diagnostic.operation = self.operation.clone();
        }
        tracing::debug!(
            code = diagnostic.code,
            operation = diagnostic.operation.as_deref().unwrap_or("-"),
            message = %diagnostic.message,
            "Compilation diagnostic"
        );
        self.items.push(diagnostic);
    }

    pub fn warn(&mut self, code: &'static str, message: impl Into<String>) {
        self.push(Diagnostic::warning(code, message));
    }

    /// Scope subsequent diagnostics to an operation.
    pub fn enter_operation(&mut self, operation_id: &str) {
        self.operation = Some(operation_id.to_string());
    }

    pub fn leave_operation(&mut self) {
        self.operation = None;
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.items.iter().any(|d| d.code == code)
    }

    pub fn warning_count(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.level == Level::Warning)
            .count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
