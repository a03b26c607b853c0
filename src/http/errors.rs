//! Problem-details style API errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::errors::RestoreServiceError;

const PROBLEM_BAD_REQUEST: &str = "urn:onehub:problem:bad-request";
const PROBLEM_FORBIDDEN: &str = "urn:onehub:problem:forbidden";
const PROBLEM_NOT_FOUND: &str = "urn:onehub:problem:not-found";
const PROBLEM_TOO_LARGE: &str = "urn:onehub:problem:payload-too-large";
const PROBLEM_TOOL_MISSING: &str = "urn:onehub:problem:tool-missing";
const PROBLEM_TOOL_FAILED: &str = "urn:onehub:problem:tool-failed";
const PROBLEM_TOOL_TIMEOUT: &str = "urn:onehub:problem:tool-timeout";
const PROBLEM_STORAGE: &str = "urn:onehub:problem:storage";
const PROBLEM_INTERNAL: &str = "urn:onehub:problem:internal";

#[derive(Debug, Serialize)]
pub(crate) struct ProblemDetails {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) title: String,
    pub(crate) status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) detail: Option<String>,
}

/// Error response returned by every handler
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, PROBLEM_FORBIDDEN, "forbidden").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, PROBLEM_NOT_FOUND, "resource not found")
            .with_detail(detail)
    }

    pub(crate) fn payload_too_large(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            PROBLEM_TOO_LARGE,
            "payload too large",
        )
        .with_detail(detail)
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(detail)
    }

    #[cfg(test)]
    pub(crate) fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl From<RestoreServiceError> for ApiError {
    fn from(err: RestoreServiceError) -> Self {
        match err {
            RestoreServiceError::InvalidRequest(message) => Self::bad_request(message),
            RestoreServiceError::ToolNotFound(path) => {
                error!(script = %path, "Restore script missing on server");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    PROBLEM_TOOL_MISSING,
                    "restore tool missing",
                )
                .with_detail("script missing on server")
            }
            // The captured output is the caller's main diagnostic
            RestoreServiceError::ExternalToolFailed { output, .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                PROBLEM_TOOL_FAILED,
                "restore tool failed",
            )
            .with_detail(output),
            RestoreServiceError::ExternalToolTimeout { timeout_secs, .. } => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                PROBLEM_TOOL_TIMEOUT,
                "restore tool timed out",
            )
            .with_detail(format!("restore did not finish within {}s", timeout_secs)),
            RestoreServiceError::StorageWriteFailed(e) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                PROBLEM_STORAGE,
                "upload could not be stored",
            )
            .with_detail(e.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}
