use crate::errors::RestoreServiceError;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while the restore tool runs; the run has no known length
pub fn create_restore_spinner(dump: &str) -> Result<ProgressBar, RestoreServiceError> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message(format!("Restoring: {}", dump));
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_template_is_valid() -> Result<(), RestoreServiceError> {
        let pb = create_restore_spinner("dumps/prod.sql")?;
        assert_eq!(pb.message(), "Restoring: dumps/prod.sql");
        pb.finish_and_clear();
        Ok(())
    }
}
