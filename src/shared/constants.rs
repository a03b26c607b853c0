// Shared constants used across the restore service

/// Restore tool invocation
pub const RESTORE_SUBCOMMAND: &str = "restore";
pub const DUMP_FLAG: &str = "--dump";
pub const NAMESPACE_FLAG: &str = "--namespace";
pub const TARGET_FLAG: &str = "--target";
pub const DEFAULT_NAMESPACE: &str = "default";

/// Trust level parsing
pub const TRUST_LEVEL_MARKER: &str = "Trust Level:";
pub const TRUST_LEVEL_UNKNOWN: &str = "UNKNOWN";

/// Correlation token length (hex chars)
pub const JOB_RUN_ID_LEN: usize = 8;

/// Defaults
pub const DEFAULT_SCRIPT_NAME: &str = "restore_demo.sh";
pub const DEFAULT_SCRIPT_INTERPRETER: &str = "bash";
pub const DEFAULT_UPLOAD_SUBDIR: &str = "backend/uploads";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_RESTORE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// HTTP
pub const HEADER_API_KEY: &str = "x-api-key";
pub const SCRIPT_CONTENT_TYPE: &str = "text/x-shellscript";
pub const SCRIPT_CACHE_CONTROL: &str = "public, max-age=86400";
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Restore tool output capture
pub const MAX_CAPTURED_OUTPUT_BYTES: usize = 4 * 1024 * 1024;
pub const MAX_OUTPUT_LINE_BYTES: u64 = 64 * 1024;
pub const OUTPUT_CHANNEL_CAPACITY: usize = 256;
pub const OUTPUT_DRAIN_GRACE_MS: u64 = 250;
