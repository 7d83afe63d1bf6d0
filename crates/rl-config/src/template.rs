//! Base document for proxy-list conversion.
//!
//! The template carries a local mixed inbound, a `select` selector defaulting
//! to an `auto` url-test group, a `direct` outbound and a route whose final
//! hop is `select`. Converted proxies are appended after the template's own
//! outbounds and added as members of every group.

use crate::node::{unique_tag, ProxyNode};
use rl_types::{ConfigError, Provenance};
use serde_json::{json, Value};
use std::collections::HashSet;

const BASE_TEMPLATE: &str = include_str!("template.json");

const GROUP_TYPES: &[&str] = &["selector", "urltest"];

/// Parse the built-in template.
pub fn base() -> Result<Value, ConfigError> {
    serde_json::from_str(BASE_TEMPLATE).map_err(|e| ConfigError::Conversion {
        provenance: Provenance::Yaml,
        message: format!("built-in template: {e}"),
    })
}

/// Merge `nodes` into a fresh copy of the template.
///
/// Names that collide with a template tag get a ` (n)` suffix.
pub fn merge(nodes: Vec<ProxyNode>) -> Result<Value, ConfigError> {
    let mut doc = base()?;
    let outbounds = doc
        .get_mut("outbounds")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ConfigError::Conversion {
            provenance: Provenance::Yaml,
            message: "built-in template has no outbounds".into(),
        })?;

    let mut taken: HashSet<String> = outbounds
        .iter()
        .filter_map(|o| o.get("tag").and_then(Value::as_str))
        .map(String::from)
        .collect();

    let mut tags = Vec::with_capacity(nodes.len());
    let mut converted = Vec::with_capacity(nodes.len());
    for mut node in nodes {
        node.name = unique_tag(&node.name, &mut taken);
        tags.push(json!(node.name));
        converted.push(node.to_outbound());
    }

    for group in outbounds.iter_mut().filter(|o| {
        o.get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| GROUP_TYPES.contains(&t))
    }) {
        if let Some(members) = group.get_mut("outbounds").and_then(Value::as_array_mut) {
            members.extend(tags.iter().cloned());
        }
    }
    outbounds.extend(converted);
    Ok(doc)
}
