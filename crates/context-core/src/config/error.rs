//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading and validating [`super::AppConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric/bool/duration env var held a value that failed to parse.
    #[error("failed to parse env var '{name}' (value '{value}'): {reason}")]
    InvalidValue {
        /// Environment variable name.
        name: &'static str,
        /// Raw string value that failed to parse.
        value: String,
        /// Human-readable parse failure reason.
        reason: String,
    },

    /// The upstream LLM bearer token was not configured.
    ///
    /// This is not a startup failure — `/gateway_ctx` must still serve
    /// requests without an upstream key. [`super::AppConfig::require_upstream_api_key`]
    /// returns this at request time instead.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
}
