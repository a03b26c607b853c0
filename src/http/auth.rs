//! Shared-secret check for internal endpoints.

use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use tracing::warn;

use crate::http::errors::ApiError;
use crate::http::state::ApiState;
use crate::shared::constants::HEADER_API_KEY;

/// Reject the request unless it carries the configured API key.
/// With no key configured every request passes.
pub(crate) async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.pipeline.config().api_key.as_deref() {
        let provided = req
            .headers()
            .get(HEADER_API_KEY)
            .and_then(|value| value.to_str().ok());

        if provided != Some(expected) {
            warn!(path = %req.uri().path(), has_header = provided.is_some(), "Rejected request with invalid API key");
            return Err(ApiError::forbidden("invalid API key"));
        }
    }

    Ok(next.run(req).await)
}
