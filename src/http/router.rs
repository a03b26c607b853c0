//! Router construction and server host for the restore API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::errors::RestoreServiceError;
use crate::http::auth::require_api_key;
use crate::http::handlers::{healthz, serve_script, trigger_restore, upload_dump};
use crate::http::state::ApiState;
use crate::restore::RestorePipeline;
use crate::shared::constants::HEADER_API_KEY;

/// Axum router wrapper that hosts the restore endpoints.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    pub fn new(pipeline: RestorePipeline) -> Self {
        let max_upload_bytes = pipeline.config().max_upload_bytes;
        let state = Arc::new(ApiState::new(pipeline));

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static(HEADER_API_KEY)]);

        let require_api = middleware::from_fn_with_state(state.clone(), require_api_key);

        let router = Router::new()
            .route("/healthz", get(healthz))
            .route("/onehub.sh", get(serve_script))
            .route(
                "/internal/restore",
                post(trigger_restore).route_layer(require_api),
            )
            .route(
                "/upload",
                post(upload_dump).layer(DefaultBodyLimit::max(max_upload_bytes)),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors_layer),
            )
            .with_state(state);

        Self { router }
    }

    /// Serve until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), RestoreServiceError> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Restore API listening");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| RestoreServiceError::ServerError(e.to_string()))
    }

    #[cfg(test)]
    pub(crate) fn router(&self) -> Router {
        self.router.clone()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restore::tests::create_test_pipeline;
    use crate::shared::executor::tests::FakeExecutor;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::path::Path;
    use tower::ServiceExt;

    const BOUNDARY: &str = "onehub-test-boundary";

    async fn build_server(base: &Path, api_key: Option<&str>, fake: Arc<FakeExecutor>, with_script: bool) -> ApiServer {
        ApiServer::new(create_test_pipeline(base, api_key, fake, with_script).await)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn multipart_request(field: &str, file_name: &str, contents: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{contents}\r\n--{b}--\r\n",
            b = BOUNDARY
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let dir = tempfile::tempdir().unwrap();
        let server = build_server(dir.path(), None, FakeExecutor::returning(0, ""), true).await;

        let response = server
            .router()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_script_is_served_fresh_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let server = build_server(dir.path(), None, FakeExecutor::returning(0, ""), true).await;
        let script = dir.path().join("restore_demo.sh");

        std::fs::write(&script, "#!/bin/bash\necho v1\n").unwrap();
        let response = server
            .router()
            .oneshot(Request::get("/onehub.sh").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/x-shellscript");
        assert_eq!(response.headers()["cache-control"], "public, max-age=86400");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"#!/bin/bash\necho v1\n");

        std::fs::write(&script, "#!/bin/bash\necho v2\n").unwrap();
        let response = server
            .router()
            .oneshot(Request::get("/onehub.sh").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"#!/bin/bash\necho v2\n");
    }

    #[tokio::test]
    async fn test_missing_script_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let server = build_server(dir.path(), None, FakeExecutor::returning(0, ""), false).await;

        let response = server
            .router()
            .oneshot(Request::get("/onehub.sh").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_internal_restore_success() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeExecutor::returning(0, "ok\nTrust Level: SUCCESS\n");
        let server = build_server(dir.path(), Some("s3cret"), fake.clone(), true).await;

        let response = server
            .router()
            .oneshot(
                Request::post("/internal/restore?dump=dumps%2Fprod.sql&target=replica")
                    .header(HEADER_API_KEY, "s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["stdout"], "ok\nTrust Level: SUCCESS\n");
        assert_eq!(json["trust_level"], "SUCCESS");
        assert_eq!(json["job_run_id"].as_str().unwrap().len(), 8);

        let seen = fake.seen.lock().unwrap();
        let args: Vec<String> = seen[0]
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            &args[1..],
            ["restore", "--dump", "dumps/prod.sql", "--namespace", "default", "--target", "replica"]
        );
    }

    #[tokio::test]
    async fn test_internal_restore_rejects_bad_key_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeExecutor::returning(0, "");
        let server = build_server(dir.path(), Some("s3cret"), fake.clone(), true).await;

        for key in [None, Some("wrong")] {
            let mut request = Request::post("/internal/restore?dump=a.sql");
            if let Some(key) = key {
                request = request.header(HEADER_API_KEY, key);
            }
            let response = server
                .router()
                .oneshot(request.body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }

        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn test_internal_restore_open_without_configured_key() {
        let dir = tempfile::tempdir().unwrap();
        let server = build_server(dir.path(), None, FakeExecutor::returning(0, "done"), true).await;

        let response = server
            .router()
            .oneshot(Request::post("/internal/restore?dump=a.sql").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_internal_restore_error_responses() {
        let dir = tempfile::tempdir().unwrap();
        let server = build_server(dir.path(), None, FakeExecutor::returning(1, "boom\n"), true).await;
        let response = server
            .router()
            .oneshot(Request::post("/internal/restore?dump=a.sql").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["detail"], "boom\n");

        let response = server
            .router()
            .oneshot(Request::post("/internal/restore").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let dir = tempfile::tempdir().unwrap();
        let server = build_server(dir.path(), None, FakeExecutor::returning(0, ""), false).await;
        let response = server
            .router()
            .oneshot(Request::post("/internal/restore?dump=a.sql").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["detail"], "script missing on server");
    }

    #[tokio::test]
    async fn test_internal_restore_timeout_is_not_success() {
        let dir = tempfile::tempdir().unwrap();
        let server = build_server(dir.path(), None, FakeExecutor::timing_out("partial"), true).await;

        let response = server
            .router()
            .oneshot(Request::post("/internal/restore?dump=a.sql").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_upload_runs_restore_on_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeExecutor::returning(0, "Restoring...\nTrust Level: SUCCESS\n");
        let server = build_server(dir.path(), None, fake.clone(), true).await;

        let response = server
            .router()
            .oneshot(multipart_request("file", "prod.dump", "PGDMP-data"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["trust_level"], "SUCCESS");
        assert_eq!(json["output"], "Restoring...\nTrust Level: SUCCESS\n");

        let file_id = json["file_id"].as_str().unwrap();
        let stored = dir
            .path()
            .join("backend/uploads")
            .join(format!("{}_prod.dump", file_id));
        assert_eq!(std::fs::read(&stored).unwrap(), b"PGDMP-data");
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn test_upload_rejects_traversal_name() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeExecutor::returning(0, "");
        let server = build_server(dir.path(), None, fake.clone(), true).await;

        let response = server
            .router()
            .oneshot(multipart_request("file", "../../escape.sql", "x"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(fake.call_count(), 0);
        assert!(!dir.path().join("escape.sql").exists());
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let server = build_server(dir.path(), None, FakeExecutor::returning(0, ""), true).await;

        let response = server
            .router()
            .oneshot(multipart_request("attachment", "prod.dump", "x"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_with_missing_tool_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let server = build_server(dir.path(), None, FakeExecutor::returning(0, ""), false).await;

        let response = server
            .router()
            .oneshot(multipart_request("file", "prod.dump", "x"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_upload_over_body_limit_is_413() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeExecutor::returning(0, "");
        let server = build_server(dir.path(), None, fake.clone(), true).await;
        let oversized = "x".repeat(2 * 1024 * 1024);

        let response = server
            .router()
            .oneshot(multipart_request("file", "prod.dump", &oversized))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(fake.call_count(), 0);
        assert_eq!(
            std::fs::read_dir(dir.path().join("backend/uploads")).unwrap().count(),
            0
        );
    }
}
