//! Provenance-tagged validation.

use crate::check::ConfigChecker;
use rl_types::{ConfigError, Provenance};

/// Run `checker` over `content`, attributing a rejection to `provenance`.
pub fn validate(
    checker: &dyn ConfigChecker,
    content: &[u8],
    provenance: Provenance,
) -> Result<(), ConfigError> {
    checker
        .check(content)
        .map_err(|source| ConfigError::Validation { provenance, source })
}
