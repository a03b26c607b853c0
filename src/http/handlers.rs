//! Request handlers for the restore service.

use std::io;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::RestoreServiceError;
use crate::http::errors::ApiError;
use crate::http::state::ApiState;
use crate::shared::commands::RestoreRequest;
use crate::shared::constants::{SCRIPT_CACHE_CONTROL, SCRIPT_CONTENT_TYPE, UPLOAD_FIELD_NAME};

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RestoreParams {
    #[serde(default)]
    pub(crate) dump: String,
    pub(crate) namespace: Option<String>,
    pub(crate) target: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RestoreResponse {
    pub(crate) job_run_id: String,
    pub(crate) stdout: String,
    pub(crate) trust_level: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadResponse {
    pub(crate) job_run_id: String,
    pub(crate) file_id: String,
    pub(crate) output: String,
    pub(crate) trust_level: String,
}

pub(crate) async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Serve the restore script exactly as it is on disk right now
pub(crate) async fn serve_script(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let script = &state.pipeline.config().script_file;
    let contents = match tokio::fs::read(script).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("script not found"));
        }
        Err(e) => {
            error!(script = %script.display(), error = %e, "Failed to read restore script");
            return Err(ApiError::internal("failed to read script"));
        }
    };

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static(SCRIPT_CONTENT_TYPE)),
            (CACHE_CONTROL, HeaderValue::from_static(SCRIPT_CACHE_CONTROL)),
        ],
        contents,
    )
        .into_response())
}

pub(crate) async fn trigger_restore(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<RestoreParams>,
) -> Result<Json<RestoreResponse>, ApiError> {
    let request = RestoreRequest::new(params.dump, params.namespace, params.target);
    let outcome = state.pipeline.restore(&request).await?;

    Ok(Json(RestoreResponse {
        job_run_id: outcome.job_run_id,
        stdout: outcome.output,
        trust_level: outcome.trust_level,
    }))
}

pub(crate) async fn upload_dump(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        info!(original_name = %original_name, "Receiving dump upload");

        let body = field.map_err(io::Error::other).boxed();
        let result = state
            .pipeline
            .restore_upload(&original_name, body)
            .await
            .map_err(upload_error)?;

        return Ok(Json(UploadResponse {
            job_run_id: result.outcome.job_run_id,
            file_id: result.upload.generated_id,
            output: result.outcome.output,
            trust_level: result.outcome.trust_level,
        }));
    }

    Err(ApiError::bad_request(format!(
        "multipart body has no '{}' field",
        UPLOAD_FIELD_NAME
    )))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(err.body_text())
    } else {
        ApiError::bad_request(format!("malformed multipart body: {}", err.body_text()))
    }
}

/// A body stream that broke inside multipart parsing is the client's fault
fn upload_error(err: RestoreServiceError) -> ApiError {
    if let RestoreServiceError::StorageWriteFailed(io_err) = &err {
        if let Some(multipart) = io_err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>())
        {
            if multipart.status() == StatusCode::PAYLOAD_TOO_LARGE {
                return ApiError::payload_too_large(multipart.body_text());
            }
        }
    }
    err.into()
}
