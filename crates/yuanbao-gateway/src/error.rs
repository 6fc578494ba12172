//! Error types for the gateway

use thiserror::Error;

/// Main error type for gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors (unknown model, missing credentials, bad config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend transport or HTTP errors
    ///
    /// The message text is what the invalidity classifier inspects, and what
    /// clients eventually see as the assistant reply.
    #[error("{0}")]
    Backend(String),

    /// Malformed backend payloads
    #[error("Parse error: {0}")]
    Parse(String),

    /// HTTP server errors (bind, serve)
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Short category name used in structured log fields
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "config",
            GatewayError::Backend(_) => "backend",
            GatewayError::Parse(_) => "parse",
            GatewayError::Server(_) => "server",
            GatewayError::Io(_) => "io",
        }
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
