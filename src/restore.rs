use crate::config::Config;
use crate::errors::RestoreServiceError;
use crate::shared::commands::{RestoreArgs, RestoreRequest, ToolInvocation};
use crate::shared::executor::{ProcessExecutor, ProcessRunner};
use crate::shared::ids::new_job_run_id;
use crate::shared::storage::{ByteStream, UploadStore, UploadedFile};
use crate::shared::trust::extract_trust_level;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Result of one successful restore run
#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub job_run_id: String,
    pub output: String,
    pub trust_level: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Restore run against a freshly uploaded dump
#[derive(Debug, Clone, Serialize)]
pub struct UploadRestoreOutcome {
    pub upload: UploadedFile,
    pub outcome: RestoreOutcome,
}

/// Request -> arguments -> child process -> trust level -> outcome
#[derive(Clone)]
pub struct RestorePipeline {
    config: Arc<Config>,
    runner: ProcessRunner,
    store: Arc<dyn UploadStore>,
}

impl RestorePipeline {
    pub fn new(
        config: Arc<Config>,
        executor: Arc<dyn ProcessExecutor>,
        store: Arc<dyn UploadStore>,
    ) -> Self {
        let runner = ProcessRunner::new(
            executor,
            config.script_file.clone(),
            config.base_dir.clone(),
            config.restore_timeout,
        );
        Self {
            config,
            runner,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Restore a dump that is already reachable by the tool
    pub async fn restore(&self, request: &RestoreRequest) -> Result<RestoreOutcome, RestoreServiceError> {
        let restore_args = RestoreArgs::build(request, &self.config.base_dir, self.store.root())
            .inspect_err(|e| {
                if e.is_client_error() {
                    warn!(dump = %request.dump_reference, error = %e, "Rejected restore request");
                }
            })?;
        let invocation = ToolInvocation::for_tool(&self.config, &restore_args);
        let job_run_id = new_job_run_id();

        info!(
            job_run_id = %job_run_id,
            dump = %request.dump_reference,
            namespace = %request.namespace,
            target = ?request.target,
            "Starting restore"
        );

        let started_at = Utc::now();
        let started = Instant::now();
        let result = match self.runner.run(&invocation).await {
            Ok(result) => result,
            Err(e) => {
                error!(job_run_id = %job_run_id, error = %e, "Restore failed");
                return Err(e);
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let trust_level = extract_trust_level(&result.combined_output);
        info!(
            job_run_id = %job_run_id,
            trust_level = %trust_level,
            duration_ms = %duration_ms,
            "Restore completed"
        );

        Ok(RestoreOutcome {
            job_run_id,
            output: result.combined_output,
            trust_level,
            started_at,
            duration_ms,
        })
    }

    /// Persist an uploaded dump, then restore it into the default namespace
    pub async fn restore_upload(
        &self,
        original_name: &str,
        body: ByteStream<'_>,
    ) -> Result<UploadRestoreOutcome, RestoreServiceError> {
        // A misconfigured server should not accumulate orphaned uploads
        self.runner.ensure_tool_present().await?;

        let upload = self.store.store(original_name, body).await?;
        let request = RestoreRequest::new(upload.stored_path.to_string_lossy(), None, None);
        let outcome = self.restore(&request).await?;

        Ok(UploadRestoreOutcome { upload, outcome })
    }
}
