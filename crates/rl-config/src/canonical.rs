//! Canonical document form.
//!
//! Every branch of the resolver ends here: the value is normalized (object
//! keys sorted recursively, array order kept) and pretty-printed once, so the
//! same logical document always produces byte-identical text.

use rl_types::{ConfigError, Provenance};
use serde_json::Value;
use std::fmt;

/// A validated sing-box document and the branch that produced it.
///
/// Only the resolver constructs these, after the checker has accepted the
/// text, so holding one means the document passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalConfig {
    provenance: Provenance,
    value: Value,
    text: String,
}

impl CanonicalConfig {
    pub(crate) fn build(provenance: Provenance, value: Value) -> Result<Self, ConfigError> {
        let value = normalize_value(value);
        let text = serde_json::to_string_pretty(&value).map_err(|e| ConfigError::Conversion {
            provenance,
            message: format!("serialize canonical document: {e}"),
        })?;
        Ok(Self {
            provenance,
            value,
            text,
        })
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Tags of every outbound in document order.
    pub fn outbound_tags(&self) -> Vec<&str> {
        self.value
            .get("outbounds")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|o| o.get("tag").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Look up an outbound object by tag.
    pub fn outbound(&self, tag: &str) -> Option<&Value> {
        self.value
            .get("outbounds")?
            .as_array()?
            .iter()
            .find(|o| o.get("tag").and_then(Value::as_str) == Some(tag))
    }
}

impl fmt::Display for CanonicalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Recursively sort object keys. Arrays keep their order; scalars pass
/// through unchanged.
#[must_use]
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, child)| (key, normalize_value(child)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        scalar => scalar,
    }
}
