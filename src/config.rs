use crate::errors::RestoreServiceError;
use crate::shared::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_RESTORE_TIMEOUT_SECS,
    DEFAULT_SCRIPT_INTERPRETER, DEFAULT_SCRIPT_NAME, DEFAULT_UPLOAD_SUBDIR,
};
use crate::shared::paths::absolute_dir;
use serde::Serialize;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub base_dir: PathBuf,
    pub script_file: PathBuf,
    pub script_interpreter: Option<String>,
    pub upload_dir: PathBuf,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub bind_addr: SocketAddr,
    pub restore_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn load() -> Result<Self, RestoreServiceError> {
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RestoreServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_dir = match non_empty("ONEHUB_BASE_DIR") {
            Some(dir) => absolute_dir(Path::new(&dir))?,
            None => env::current_dir()?,
        };

        let script_file = non_empty("ONEHUB_SCRIPT_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join(DEFAULT_SCRIPT_NAME));

        // Present but empty means "execute the script directly"
        let script_interpreter = match lookup("ONEHUB_SCRIPT_INTERPRETER") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value.trim().to_string()),
            None => Some(DEFAULT_SCRIPT_INTERPRETER.to_string()),
        };

        let upload_dir = match non_empty("ONEHUB_UPLOAD_DIR") {
            Some(dir) => absolute_dir(Path::new(&dir))?,
            None => base_dir.join(DEFAULT_UPLOAD_SUBDIR),
        };

        let api_key = non_empty("ONEHUB_API_KEY");

        let bind_addr = non_empty("ONEHUB_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| {
                RestoreServiceError::ConfigurationError(format!("ONEHUB_BIND_ADDR: {}", e))
            })?;

        let timeout_secs = parse_positive(
            "ONEHUB_RESTORE_TIMEOUT_SECS",
            non_empty("ONEHUB_RESTORE_TIMEOUT_SECS"),
            DEFAULT_RESTORE_TIMEOUT_SECS,
        )?;

        let max_upload_bytes = parse_positive(
            "ONEHUB_MAX_UPLOAD_BYTES",
            non_empty("ONEHUB_MAX_UPLOAD_BYTES"),
            DEFAULT_MAX_UPLOAD_BYTES as u64,
        )?;
        let max_upload_bytes = usize::try_from(max_upload_bytes).map_err(|_| {
            RestoreServiceError::ConfigurationError(
                "ONEHUB_MAX_UPLOAD_BYTES: value too large for this platform".to_string(),
            )
        })?;

        Ok(Config {
            base_dir,
            script_file,
            script_interpreter,
            upload_dir,
            api_key,
            bind_addr,
            restore_timeout: Duration::from_secs(timeout_secs),
            max_upload_bytes,
        })
    }
}

fn parse_positive(key: &str, raw: Option<String>, default: u64) -> Result<u64, RestoreServiceError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(RestoreServiceError::ConfigurationError(format!(
            "{} must be greater than zero",
            key
        ))),
        Ok(value) => Ok(value),
        Err(e) => Err(RestoreServiceError::ConfigurationError(format!(
            "{}: {}",
            key, e
        ))),
    }
}
