use crate::errors::RestoreServiceError;
use crate::shared::commands::ToolInvocation;
use crate::shared::constants::{
    MAX_CAPTURED_OUTPUT_BYTES, MAX_OUTPUT_LINE_BYTES, OUTPUT_CHANNEL_CAPACITY,
    OUTPUT_DRAIN_GRACE_MS,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What a finished (or killed) child left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub exit_code: i32,
    pub combined_output: String,
    pub timed_out: bool,
}

/// Runs one invocation as a child process
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        working_dir: &Path,
        timeout: Duration,
    ) -> Result<ProcessResult, RestoreServiceError>;
}

/// Tokio-backed executor, stdout and stderr merged line by line
#[derive(Debug, Clone)]
pub struct TokioProcessExecutor {
    output_limit: usize,
}

impl Default for TokioProcessExecutor {
    fn default() -> Self {
        Self {
            output_limit: MAX_CAPTURED_OUTPUT_BYTES,
        }
    }
}

impl TokioProcessExecutor {
    /// Keep at most `output_limit` bytes of the most recent output
    pub fn with_output_limit(output_limit: usize) -> Self {
        Self { output_limit }
    }
}

#[async_trait]
impl ProcessExecutor for TokioProcessExecutor {
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        working_dir: &Path,
        timeout: Duration,
    ) -> Result<ProcessResult, RestoreServiceError> {
        debug!(program = ?invocation.program, args = ?invocation.args, cwd = %working_dir.display(), "Spawning restore tool");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Everything the tool starts shares its process group
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => RestoreServiceError::ToolNotFound(format!(
                "{}: {}",
                invocation.program.to_string_lossy(),
                e
            )),
            _ => RestoreServiceError::IoError(e),
        })?;
        let mut group = ProcessGroup::new(child.id());

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(OUTPUT_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(BufReader::new(stdout), tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(BufReader::new(stderr), tx.clone()));
        }
        drop(tx);

        let mut output = CapturedOutput::new(self.output_limit);
        let grace = Duration::from_millis(OUTPUT_DRAIN_GRACE_MS);

        // The budget covers the child only; leftover pipe holders get the grace period
        let waited = tokio::time::timeout(timeout, async {
            loop {
                tokio::select! {
                    status = child.wait() => break status,
                    Some(line) = rx.recv() => output.push(line),
                }
            }
        })
        .await;

        match waited {
            Ok(status) => {
                let status = status?;
                group.release();
                drain_for(&mut rx, &mut output, grace).await;
                Ok(ProcessResult {
                    // Killed by a signal: no exit code
                    exit_code: status.code().unwrap_or(-1),
                    combined_output: output.into_string(),
                    timed_out: false,
                })
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Restore tool exceeded time budget, killing");
                group.kill();
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill timed out restore tool");
                }
                // Whatever arrived before the deadline
                drain_for(&mut rx, &mut output, grace).await;
                Ok(ProcessResult {
                    exit_code: -1,
                    combined_output: output.into_string(),
                    timed_out: true,
                })
            }
        }
    }
}

/// Kills the child's whole process group on drop unless released
struct ProcessGroup {
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    /// The leader exited on its own; leave any survivors alone
    fn release(&mut self) {
        self.leader = None;
    }

    fn kill(&mut self) {
        if let Some(leader) = self.leader.take() {
            kill_process_group(leader);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_process_group(leader: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(leader) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = leader, error = %e, "Failed to kill restore tool process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_leader: u32) {}

/// Most recent output lines, bounded in bytes
struct CapturedOutput {
    lines: VecDeque<Vec<u8>>,
    bytes: usize,
    limit: usize,
    dropped: usize,
}

impl CapturedOutput {
    fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            limit,
            dropped: 0,
        }
    }

    fn push(&mut self, mut line: Vec<u8>) {
        if line.len() > self.limit {
            let cut = line.len() - self.limit;
            line.drain(..cut);
            self.dropped += cut;
        }
        self.bytes += line.len();
        self.lines.push_back(line);

        while self.bytes > self.limit {
            match self.lines.pop_front() {
                Some(old) => {
                    self.bytes -= old.len();
                    self.dropped += old.len();
                }
                None => break,
            }
        }
    }

    fn into_string(self) -> String {
        let mut combined = Vec::with_capacity(self.bytes);
        if self.dropped > 0 {
            warn!(dropped_bytes = self.dropped, "Restore tool output truncated");
            combined.extend_from_slice(
                format!("[... {} bytes of earlier output truncated ...]\n", self.dropped).as_bytes(),
            );
        }
        for line in self.lines {
            combined.extend_from_slice(&line);
        }
        String::from_utf8_lossy(&combined).into_owned()
    }
}

async fn drain_for(rx: &mut mpsc::Receiver<Vec<u8>>, output: &mut CapturedOutput, grace: Duration) {
    let drained = tokio::time::timeout(grace, async {
        while let Some(line) = rx.recv().await {
            output.push(line);
        }
    })
    .await;
    if drained.is_err() {
        debug!("Restore tool output still open after exit, not waiting for it");
    }
}

async fn forward_lines<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = Vec::new();
        // Overlong lines arrive in pieces
        match (&mut reader)
            .take(MAX_OUTPUT_LINE_BYTES)
            .read_until(b'\n', &mut line)
            .await
        {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "Stopped reading restore tool output");
                break;
            }
        }
    }
}

/// Enforces the restore tool contract around an executor: presence check,
/// timeout budget and exit status mapping. One spawn per call, no retries.
#[derive(Clone)]
pub struct ProcessRunner {
    executor: Arc<dyn ProcessExecutor>,
    script_file: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(
        executor: Arc<dyn ProcessExecutor>,
        script_file: PathBuf,
        working_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            script_file,
            working_dir,
            timeout,
        }
    }

    /// Fail with `ToolNotFound` unless the restore script is on disk
    pub async fn ensure_tool_present(&self) -> Result<(), RestoreServiceError> {
        match tokio::fs::metadata(&self.script_file).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(RestoreServiceError::ToolNotFound(
                self.script_file.display().to_string(),
            )),
        }
    }

    /// Run the invocation; only a zero exit counts as success
    pub async fn run(&self, invocation: &ToolInvocation) -> Result<ProcessResult, RestoreServiceError> {
        self.ensure_tool_present().await?;

        let started = Instant::now();
        let result = self
            .executor
            .execute(invocation, &self.working_dir, self.timeout)
            .await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if result.timed_out {
            warn!(elapsed_ms = %elapsed_ms, "Restore tool timed out");
            return Err(RestoreServiceError::ExternalToolTimeout {
                timeout_secs: self.timeout.as_secs(),
                output: result.combined_output,
            });
        }

        if result.exit_code != 0 {
            warn!(exit_code = %result.exit_code, elapsed_ms = %elapsed_ms, "Restore tool failed");
            return Err(RestoreServiceError::ExternalToolFailed {
                exit_code: result.exit_code,
                output: result.combined_output,
            });
        }

        debug!(elapsed_ms = %elapsed_ms, output_bytes = result.combined_output.len(), "Restore tool finished");
        Ok(result)
    }
}
