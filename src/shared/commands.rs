use crate::config::Config;
use crate::errors::RestoreServiceError;
use crate::shared::constants::{
    DEFAULT_NAMESPACE, DUMP_FLAG, NAMESPACE_FLAG, RESTORE_SUBCOMMAND, TARGET_FLAG,
};
use crate::shared::paths::walks_out_of;
use std::ffi::OsString;
use std::path::Path;

/// Parameters for one restore run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub dump_reference: String,
    pub namespace: String,
    pub target: Option<String>,
}

impl RestoreRequest {
    /// Normalize raw caller input: blank namespace falls back to the default,
    /// blank target counts as absent.
    pub fn new(dump_reference: impl Into<String>, namespace: Option<String>, target: Option<String>) -> Self {
        let namespace = namespace
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let target = target
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Self {
            dump_reference: dump_reference.into(),
            namespace,
            target,
        }
    }

    /// Reject input that must never reach the restore tool
    ///
    /// Relative references resolve against `base_dir`, the tool's working directory.
    pub fn validate(&self, base_dir: &Path, upload_dir: &Path) -> Result<(), RestoreServiceError> {
        if self.dump_reference.trim().is_empty() {
            return Err(RestoreServiceError::invalid("dump reference must not be empty"));
        }

        check_token("dump", &self.dump_reference)?;
        check_token("namespace", &self.namespace)?;
        if let Some(target) = &self.target {
            check_token("target", target)?;
        }

        // References into the storage directory must stay inside it
        if walks_out_of(base_dir, Path::new(&self.dump_reference), upload_dir) {
            return Err(RestoreServiceError::invalid(
                "dump reference escapes the upload directory",
            ));
        }

        Ok(())
    }
}

fn check_token(field: &str, value: &str) -> Result<(), RestoreServiceError> {
    if value.starts_with('-') {
        return Err(RestoreServiceError::invalid(format!(
            "{} must not start with '-'",
            field
        )));
    }
    if value.contains('\0') {
        return Err(RestoreServiceError::invalid(format!(
            "{} must not contain NUL bytes",
            field
        )));
    }
    Ok(())
}

/// Argument vector handed to the restore tool, one token per element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreArgs(Vec<String>);

impl RestoreArgs {
    /// Build `restore --dump <ref> --namespace <ns> [--target <t>]`
    pub fn build(
        request: &RestoreRequest,
        base_dir: &Path,
        upload_dir: &Path,
    ) -> Result<Self, RestoreServiceError> {
        request.validate(base_dir, upload_dir)?;

        let mut args = vec![
            RESTORE_SUBCOMMAND.to_string(),
            DUMP_FLAG.to_string(),
            request.dump_reference.clone(),
            NAMESPACE_FLAG.to_string(),
            request.namespace.clone(),
        ];
        if let Some(target) = &request.target {
            args.extend([TARGET_FLAG.to_string(), target.clone()]);
        }

        Ok(Self(args))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Program plus arguments, ready to spawn without a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    /// Prefix the restore arguments with the configured tool
    pub fn for_tool(config: &Config, restore_args: &RestoreArgs) -> Self {
        let (program, mut args): (OsString, Vec<OsString>) = match &config.script_interpreter {
            Some(interpreter) => (
                OsString::from(interpreter),
                vec![config.script_file.clone().into_os_string()],
            ),
            None => (config.script_file.clone().into_os_string(), Vec::new()),
        };
        args.extend(restore_args.as_slice().iter().map(OsString::from));

        Self { program, args }
    }
}
