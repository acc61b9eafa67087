// Error taxonomy for the generation engine.

use std::fmt;

/// Error type for chain execution, sequence runs and remote generation calls.
#[derive(Debug)]
pub enum EngineError {
    /// Cooperative cancellation. Never surfaced as a user-facing failure;
    /// affected frames/nodes revert to a resumable state instead.
    Aborted,
    /// Missing or invalid input, caught before any external call.
    Validation(String),
    /// The generation service returned an error response.
    Remote {
        status: Option<u16>,
        message: String,
    },
    /// Transport-level failure before a response was received.
    RequestFailed(String),
    /// Failed to parse a response or a stored node value.
    Parse(String),
}

impl EngineError {
    /// HTTP-like status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Remote { status, .. } => *status,
            _ => None,
        }
    }

    /// Transient-overload signal: HTTP 503/429 or a message mentioning
    /// "overloaded". Only these errors are eligible for retry.
    pub fn is_transient(&self) -> bool {
        if matches!(self.status(), Some(503) | Some(429)) {
            return true;
        }
        self.to_string().to_lowercase().contains("overloaded")
    }

    /// Whether this error represents cancellation rather than a real failure.
    pub fn is_abort(&self) -> bool {
        match self {
            EngineError::Aborted => true,
            EngineError::RequestFailed(msg) => msg == "Aborted" || msg.ends_with("AbortError"),
            _ => false,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Aborted => write!(f, "Aborted"),
            EngineError::Validation(msg) => write!(f, "{}", msg),
            EngineError::Remote {
                status: Some(status),
                message,
            } => write!(f, "Generation service error {}: {}", status, message),
            EngineError::Remote {
                status: None,
                message,
            } => write!(f, "Generation service error: {}", message),
            EngineError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            EngineError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::RequestFailed(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}
