use crate::compiler::{self, CompileOptions};
use crate::config::Config;
use crate::error::{AppError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Document compiled once at startup to exercise the whole pipeline.
const WARMUP_SPEC: &str = r##"{
  "openapi": "3.0.0",
  "paths": {
    "/warmup/{id}": {
      "get": {
        "parameters": [
          { "name": "id", "in": "path", "required": true, "schema": { "$ref": "#/components/schemas/Id" } }
        ]
      }
    }
  },
  "components": { "schemas": { "Id": { "type": "string" } } }
}"##;

/// Application state shared across all request handlers.
///
/// Holds configuration and the concurrency limit only. Every compilation
/// owns its parsed document, so nothing here is per-specification.
pub struct AppState {
    pub semaphore: Arc<Semaphore>,
    /// Set once the server is accepting connections.
    pub ready: AtomicBool,
    pub config: Arc<Config>,
}

impl AppState {
    /// Initialize application state.
    ///
    /// # Semaphore Strategy
    /// Permits = CPU cores unless `PERMITS` overrides it. Each compilation
    /// acquires one permit and runs on the blocking pool, so CPU-bound
    /// compilations never starve the async workers.
    pub fn new(config: Config) -> Result<Self> {
        let num_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let permits = config.permits.unwrap_or(num_cores).max(1);

        tracing::info!(num_cores, permits, "Configured compilation permits");

        let state = Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            ready: AtomicBool::new(false),
            config: Arc::new(config),
        };

        state.warmup()?;

        Ok(state)
    }

    pub fn compile_options(&self) -> CompileOptions {
        self.config.compile_options()
    }

    fn warmup(&self) -> Result<()> {
        tracing::info!("Running compiler warmup...");

        let tools = compiler::compile(WARMUP_SPEC, &self.compile_options())?;
        if tools.len() != 1 {
            return Err(AppError::InternalError(format!(
                "Warmup produced {} tools, expected 1",
                tools.len()
            )));
        }

        tracing::info!("Compiler warmup completed successfully");
        Ok(())
    }

    /// Called after the listener is bound.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Check if the service is ready to handle requests.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_only_after_mark_ready() {
        let state = AppState::new(Config::default()).unwrap();
        assert!(!state.is_ready());

        state.mark_ready();
        assert!(state.is_ready());
    }

    #[test]
    fn test_permit_override() {
        let config = Config {
            permits: Some(2),
            ..Config::default()
        };
        let state = AppState::new(config).unwrap();
        assert_eq!(state.semaphore.available_permits(), 2);
    }
}
