use crate::compiler::{
    schema::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES},
    CompileOptions,
};
use std::env;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Largest accepted request body (specification text), in bytes.
    pub max_spec_bytes: usize,
    /// Upper bound on a single compilation before the request gets a 503.
    pub compile_timeout_secs: u64,
    /// Optional override for concurrent compilations. If None, uses
    /// available CPU cores (compilation is CPU-bound).
    pub permits: Option<usize>,
    /// Schema nesting limit, references included.
    pub max_schema_depth: usize,
    /// Schema node budget per compilation.
    pub max_schema_nodes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_secs: 30,
            max_spec_bytes: 10 * 1024 * 1024,
            compile_timeout_secs: 30,
            permits: None,
            max_schema_depth: DEFAULT_MAX_DEPTH,
            max_schema_nodes: DEFAULT_MAX_NODES,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// - `HOST`, `PORT`: listen address (default `0.0.0.0:8080`)
    /// - `SHUTDOWN_TIMEOUT`: drain time in seconds after a shutdown signal
    /// - `MAX_SPEC_BYTES`: request body limit
    /// - `COMPILE_TIMEOUT_SECS`: per-compilation timeout
    /// - `PERMITS`: concurrent compilations (default: CPU cores)
    /// - `MAX_SCHEMA_DEPTH`: schema nesting limit
    /// - `MAX_SCHEMA_NODES`: schema node budget per compilation
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            shutdown_timeout_secs: parse_var("SHUTDOWN_TIMEOUT", defaults.shutdown_timeout_secs)?,
            max_spec_bytes: parse_var("MAX_SPEC_BYTES", defaults.max_spec_bytes)?,
            compile_timeout_secs: parse_var("COMPILE_TIMEOUT_SECS", defaults.compile_timeout_secs)?,
            permits: env::var("PERMITS").ok().and_then(|s| s.parse().ok()),
            max_schema_depth: parse_var("MAX_SCHEMA_DEPTH", defaults.max_schema_depth)?,
            max_schema_nodes: parse_var("MAX_SCHEMA_NODES", defaults.max_schema_nodes)?,
        })
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            max_schema_depth: self.max_schema_depth,
            max_schema_nodes: self.max_schema_nodes,
        }
    }
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_schema_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.compile_options().max_schema_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.compile_options().max_schema_nodes, DEFAULT_MAX_NODES);
    }

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let value: u64 = parse_var("ACTIONFORGE_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
