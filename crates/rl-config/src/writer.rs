//! Persisting canonical documents.

use crate::canonical::CanonicalConfig;
use crate::check::ConfigChecker;
use crate::input::RawInput;
use crate::resolve::FormatResolver;
use rl_types::ConfigError;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Resolve `raw` and write the canonical text to `target`.
///
/// The text goes to `<target>.tmp` first and is renamed over `target`, so
/// readers never observe a partial file. Nothing is written when resolution
/// fails.
pub fn write_canonical(
    raw: &RawInput,
    checker: &dyn ConfigChecker,
    target: &Path,
) -> Result<CanonicalConfig, ConfigError> {
    let canonical = FormatResolver::new(checker).resolve(raw)?;
    let tmp = tmp_path(target);
    let write_err = |source| ConfigError::Write {
        path: target.to_path_buf(),
        source,
    };
    fs::write(&tmp, canonical.as_bytes()).map_err(write_err)?;
    if let Err(source) = fs::rename(&tmp, target) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(source));
    }
    info!(path = %target.display(), provenance = %canonical.provenance(), "canonical config written");
    Ok(canonical)
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
