//! Raw resolver input: inline text or a file to read it from.

use rl_types::ConfigError;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

/// Inline config text or a path to read it from.
///
/// Inline text wins when both are present; the path is only consulted when
/// the text is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInput {
    content: String,
    path: Option<PathBuf>,
}

impl RawInput {
    pub fn inline(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            path: None,
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            content: String::new(),
            path: Some(path.into()),
        }
    }

    /// Build from the `(content, path)` pair transports hand over, where an
    /// empty string means "absent".
    pub fn from_parts(content: impl Into<String>, path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        Self {
            content: content.into(),
            path: (!path.is_empty()).then(|| PathBuf::from(path)),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn file(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.path.is_none()
    }

    /// Produce the text to resolve.
    ///
    /// # Errors
    /// [`ConfigError::EmptyInput`] when nothing was supplied or the file is
    /// empty; [`ConfigError::Read`] when the file cannot be read.
    pub fn load(&self) -> Result<Cow<'_, str>, ConfigError> {
        if !self.content.is_empty() {
            return Ok(Cow::Borrowed(&self.content));
        }
        let Some(path) = self.path.as_deref() else {
            return Err(ConfigError::EmptyInput);
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if text.is_empty() {
            return Err(ConfigError::EmptyInput);
        }
        Ok(Cow::Owned(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_parts_are_empty_input() {
        let raw = RawInput::from_parts("", "");
        assert!(raw.is_empty());
        assert!(matches!(raw.load(), Err(ConfigError::EmptyInput)));
    }

    #[test]
    fn inline_wins_over_path() {
        let raw = RawInput::from_parts("{}", "/definitely/not/here.json");
        assert_eq!(raw.load().unwrap(), "{}");
    }

    #[test]
    fn reads_file_when_inline_empty() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, "{{\"outbounds\":[]}}")?;
        let raw = RawInput::path(file.path());
        assert_eq!(raw.load()?, "{\"outbounds\":[]}");
        Ok(())
    }

    #[test]
    fn missing_file_is_read_failure() {
        let raw = RawInput::path("/definitely/not/here.json");
        match raw.load() {
            Err(ConfigError::Read { path, .. }) => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.json"))
            }
            other => panic!("expected read failure, got {other:?}"),
        }
    }

    #[test]
    fn empty_file_is_empty_input() -> anyhow::Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        let raw = RawInput::path(file.path());
        assert!(matches!(raw.load(), Err(ConfigError::EmptyInput)));
        Ok(())
    }
}
