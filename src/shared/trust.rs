use crate::shared::constants::{TRUST_LEVEL_MARKER, TRUST_LEVEL_UNKNOWN};

/// Pull the trust classification out of the restore tool's output.
///
/// The first line starting with `Trust Level:` wins; later ones are ignored.
/// Output without such a line yields `UNKNOWN`.
pub fn extract_trust_level(output: &str) -> String {
    output
        .lines()
        .find(|line| line.starts_with(TRUST_LEVEL_MARKER))
        .and_then(|line| line.split_once(':'))
        .map(|(_, level)| level.trim().to_string())
        .unwrap_or_else(|| TRUST_LEVEL_UNKNOWN.to_string())
}
