//! Actionforge - OpenAPI to agent tool compiler
//!
//! This library exposes the compiler and the HTTP handlers that host it,
//! enabling integration tests and embedding the compiler in other services.

pub mod compiler;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

// Re-export key types for convenience
pub use compiler::{compile, CompileError, CompileOptions, OutboundRequest, Tool, ToolSet};
pub use config::Config;
pub use error::{AppError, Result};
pub use handlers::{compile_handler, execute_handler, health_handler, ready_handler};
pub use state::AppState;
