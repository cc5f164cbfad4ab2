//! Error types for Qlik MCP operations.

use thiserror::Error;

/// Main error type for Qlik operations.
///
/// Domain errors (`Validation`, `NotFound`, `Collision`) are raised before the
/// main external invocation. `ExternalTool` covers every way a qlik-cli call
/// can fail and always carries the captured stderr when there was any.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QlikError {
    /// Malformed or missing input, detected before any external call
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced app, space or context does not exist or is not accessible
    #[error("not found: {0}")]
    NotFound(String),

    /// Target name already exists and no override was requested
    #[error("name collision: {0}")]
    Collision(String),

    /// qlik-cli could not be run, timed out, or exited non-zero
    #[error("qlik-cli error: {0}")]
    ExternalTool(String),

    /// Invalid server configuration
    #[error("invalid config: {0}")]
    Config(String),

    /// Local filesystem failure outside of input validation
    #[error("I/O error: {0}")]
    Io(String),
}

impl QlikError {
    /// Short category name used in tool responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            QlikError::Validation(_) => "validation",
            QlikError::NotFound(_) => "not_found",
            QlikError::Collision(_) => "collision",
            QlikError::ExternalTool(_) => "external_tool",
            QlikError::Config(_) => "config",
            QlikError::Io(_) => "io",
        }
    }
}

/// Result type alias for Qlik operations
pub type Result<T> = std::result::Result<T, QlikError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = QlikError::Validation("app identifier cannot be empty".to_string());
        assert_eq!(
            err.to_string(),
            "validation failed: app identifier cannot be empty"
        );
    }

    #[test]
    fn test_external_tool_display() {
        let err = QlikError::ExternalTool("qlik app ls failed with code 1: boom".to_string());
        assert_eq!(
            err.to_string(),
            "qlik-cli error: qlik app ls failed with code 1: boom"
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(QlikError::Collision("x".into()).kind(), "collision");
        assert_eq!(QlikError::NotFound("x".into()).kind(), "not_found");
    }
}
