use crate::errors::RestoreServiceError;
use crate::restore::RestoreOutcome;
use tracing::{error, info};

/// How many trailing output lines a failure summary shows
const FAILURE_TAIL_LINES: usize = 20;

/// Display formatter for CLI restore runs
pub struct DisplayFormatter;

impl DisplayFormatter {
    /// Display a finished restore (main entry point)
    pub fn display_restore_outcome(outcome: &RestoreOutcome) -> Result<(), RestoreServiceError> {
        info!("");
        info!("RESTORE SUMMARY:");
        info!("================");
        info!("  Job run id:  {}", outcome.job_run_id);
        info!("  Trust level: {}", outcome.trust_level);
        info!(
            "  Started:     {}",
            outcome.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        info!("  Duration:    {} ms", outcome.duration_ms);

        Self::display_output_section("TOOL OUTPUT:", &outcome.output, None)?;
        info!("");
        Ok(())
    }

    /// Display a failed restore, including the tool's last words if there are any
    pub fn display_restore_failure(err: &RestoreServiceError) -> Result<(), RestoreServiceError> {
        info!("");
        error!("RESTORE FAILED: {}", err);
        if let Some(output) = err.tool_output() {
            Self::display_output_section("LAST TOOL OUTPUT:", output, Some(FAILURE_TAIL_LINES))?;
        }
        Ok(())
    }

    fn display_output_section(
        heading: &str,
        output: &str,
        limit: Option<usize>,
    ) -> Result<(), RestoreServiceError> {
        info!("");
        info!("{}", heading);
        info!("{}", "=".repeat(heading.len()));

        let lines = match limit {
            Some(n) => Self::tail_lines(output, n),
            None => output.lines().collect(),
        };
        if lines.is_empty() {
            info!("  (no output)");
        }
        for line in lines {
            info!("  {}", line);
        }
        Ok(())
    }

    /// Last `n` lines of the output, in order
    fn tail_lines(output: &str, n: usize) -> Vec<&str> {
        let lines: Vec<&str> = output.lines().collect();
        let skip = lines.len().saturating_sub(n);
        lines.into_iter().skip(skip).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_tail_lines_keeps_order() {
        let output = "one\ntwo\nthree\nfour\n";
        assert_eq!(DisplayFormatter::tail_lines(output, 2), vec!["three", "four"]);
        assert_eq!(DisplayFormatter::tail_lines(output, 10).len(), 4);
        assert!(DisplayFormatter::tail_lines("", 3).is_empty());
    }

    #[test]
    fn test_display_does_not_fail_on_odd_output() -> Result<(), RestoreServiceError> {
        let outcome = RestoreOutcome {
            job_run_id: "deadbeef".to_string(),
            output: "\r\n\n  \nTrust Level: HIGH".to_string(),
            trust_level: "HIGH".to_string(),
            started_at: Utc::now(),
            duration_ms: 12,
        };
        DisplayFormatter::display_restore_outcome(&outcome)?;
        DisplayFormatter::display_restore_failure(&RestoreServiceError::ExternalToolFailed {
            exit_code: 1,
            output: String::new(),
        })?;
        Ok(())
    }
}
