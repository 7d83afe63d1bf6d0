//! Format resolution: fixed-order fallback over the three input shapes.
//!
//! 1. native JSON: the first JSON value in the text;
//! 2. share links;
//! 3. proxy-list YAML with a `proxies` list.
//!
//! A branch that fails to *parse* falls through to the next one. A branch
//! that parses owns the outcome: its conversion or validation failure is
//! returned as is.

use crate::canonical::CanonicalConfig;
use crate::check::ConfigChecker;
use crate::input::RawInput;
use crate::{clash, share_link, validator};
use rl_types::{boundary, ConfigError, FormatAttempt, Provenance};
use serde_json::Value;
use tracing::{debug, info};

/// Resolves raw input to a [`CanonicalConfig`] using a borrowed checker.
#[derive(Clone, Copy)]
pub struct FormatResolver<'a> {
    checker: &'a dyn ConfigChecker,
}

impl<'a> FormatResolver<'a> {
    pub fn new(checker: &'a dyn ConfigChecker) -> Self {
        Self { checker }
    }

    /// Load and resolve `raw`.
    ///
    /// # Errors
    /// - [`ConfigError::EmptyInput`] / [`ConfigError::Read`] from loading;
    /// - [`ConfigError::Unsupported`] with one attempt per branch when no
    ///   branch parses;
    /// - [`ConfigError::NoOutbounds`], [`ConfigError::Conversion`] or
    ///   [`ConfigError::Validation`] from the branch that parsed;
    /// - [`ConfigError::Fault`] if anything panics underneath.
    pub fn resolve(&self, raw: &RawInput) -> Result<CanonicalConfig, ConfigError> {
        boundary("resolve", || {
            let content = raw.load()?;
            self.resolve_content(&content)
        })
    }

    /// Resolve already-loaded text.
    pub fn resolve_content(&self, content: &str) -> Result<CanonicalConfig, ConfigError> {
        if content.is_empty() {
            return Err(ConfigError::EmptyInput);
        }
        let mut attempts = Vec::with_capacity(Provenance::ORDER.len());

        match decode_native(content) {
            Ok(value) => return self.finish(Provenance::Native, value),
            Err(reason) => attempts.push(FormatAttempt::new(Provenance::Native, reason)),
        }

        match share_link::parse_links(content) {
            Ok(nodes) => {
                debug!(links = nodes.len(), "content parsed as share links");
                return self.finish(Provenance::Uri, share_link::to_document(nodes));
            }
            Err(reason) => attempts.push(FormatAttempt::new(Provenance::Uri, reason)),
        }

        match clash::parse_document(content) {
            Ok(entries) => {
                debug!(entries = entries.len(), "content parsed as proxy list");
                let value = clash::convert(&entries)?;
                return self.finish(Provenance::Yaml, value);
            }
            Err(reason) => attempts.push(FormatAttempt::new(Provenance::Yaml, reason)),
        }

        debug!(?attempts, "no branch accepted the content");
        Err(ConfigError::Unsupported { attempts })
    }

    fn finish(&self, provenance: Provenance, value: Value) -> Result<CanonicalConfig, ConfigError> {
        let canonical = CanonicalConfig::build(provenance, value)?;
        validator::validate(self.checker, canonical.as_bytes(), provenance)?;
        info!(
            %provenance,
            outbounds = canonical.outbound_tags().len(),
            "config resolved"
        );
        Ok(canonical)
    }
}

/// Decode the first JSON value of `content`; anything after it is ignored.
/// Any value parses; its shape is the checker's concern.
fn decode_native(content: &str) -> Result<Value, String> {
    let mut stream = serde_json::Deserializer::from_str(content).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("no JSON value".into()),
    }
}
