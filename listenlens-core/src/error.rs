use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LensError {
    #[error("generation collaborator unavailable: {0}")]
    GenerationUnavailable(String),
    #[error("generated output '{output}' failed schema validation: {reason}")]
    SchemaViolation { output: String, reason: String },
    #[error("tool call failed for '{tool_name}': {reason}")]
    ToolCallFailed { tool_name: String, reason: String },
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("max attempts ({max}) exceeded")]
    MaxAttemptsExceeded { max: usize },
    #[error("operation was cancelled")]
    Cancelled,
    #[error("serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
}

impl From<crate::tool::ToolError> for LensError {
    fn from(err: crate::tool::ToolError) -> Self {
        LensError::Custom(err.to_string())
    }
}
