use crate::shared::constants::JOB_RUN_ID_LEN;
use uuid::Uuid;

/// Short correlation token for one restore run. Not deduplicated.
pub fn new_job_run_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(JOB_RUN_ID_LEN);
    id
}

/// Full-length id used to prefix stored upload file names
pub fn new_upload_id() -> String {
    Uuid::new_v4().simple().to_string()
}
