use thiserror::Error;

/// Error enum for the restore service using thiserror
#[derive(Error, Debug)]
pub enum RestoreServiceError {
    // Pipeline errors, surfaced to the caller as-is
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Restore tool not found: {0}")]
    ToolNotFound(String),

    #[error("Restore tool exited with code {exit_code}")]
    ExternalToolFailed { exit_code: i32, output: String },

    #[error("Restore tool timed out after {timeout_secs}s")]
    ExternalToolTimeout { timeout_secs: u64, output: String },

    #[error("Failed to store upload: {0}")]
    StorageWriteFailed(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    // Automatic conversions from standard library errors
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    TemplateError(#[from] indicatif::style::TemplateError),
}

impl RestoreServiceError {
    /// True when the caller sent something we refuse to act on
    pub fn is_client_error(&self) -> bool {
        matches!(self, RestoreServiceError::InvalidRequest(_))
    }

    /// Captured tool output carried by the error, if any
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            RestoreServiceError::ExternalToolFailed { output, .. }
            | RestoreServiceError::ExternalToolTimeout { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        RestoreServiceError::InvalidRequest(message.into())
    }
}
