//! Proxy-list (Clash YAML) adapter.
//!
//! Only the `proxies` list is read; groups and rules are not carried over.
//! Converted proxies are merged into the built-in [`template`](crate::template).

use crate::node::{ProxyNode, Protocol, Reality};
use crate::template;
use rl_types::{ConfigError, Provenance};
use serde::Deserialize;
use serde_json::Value;
use serde_yaml::{Mapping, Value as YamlValue};
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct ClashDoc {
    #[serde(default)]
    proxies: Option<Vec<YamlValue>>,
}

/// Probe `content` as a proxy-list document and return its raw entries.
///
/// A document without a `proxies` list (absent or null) does not count as a
/// proxy-list document; an empty list does.
pub fn parse_document(content: &str) -> Result<Vec<YamlValue>, String> {
    let doc: ClashDoc = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    doc.proxies.ok_or_else(|| "missing proxies list".to_string())
}

/// Convert proxy entries and merge them into the template document.
///
/// # Errors
/// [`ConfigError::NoOutbounds`] for an empty list; [`ConfigError::Conversion`]
/// for malformed or duplicate entries, or when no entry is supported.
pub fn convert(entries: &[YamlValue]) -> Result<Value, ConfigError> {
    if entries.is_empty() {
        return Err(ConfigError::NoOutbounds);
    }

    let mut names = HashSet::new();
    let mut nodes = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match entry_to_node(entry) {
            Ok(node) => {
                if !names.insert(node.name.clone()) {
                    return Err(conversion(format!("duplicate proxy name {:?}", node.name)));
                }
                nodes.push(node);
            }
            Err(EntryError::Skip(reason)) => {
                warn!(index, %reason, "skipping proxy entry");
            }
            Err(EntryError::Invalid(reason)) => {
                return Err(conversion(format!("proxies[{index}]: {reason}")));
            }
        }
    }
    if nodes.is_empty() {
        return Err(conversion("no supported proxies".into()));
    }
    template::merge(nodes)
}

fn conversion(message: String) -> ConfigError {
    ConfigError::Conversion {
        provenance: Provenance::Yaml,
        message,
    }
}

enum EntryError {
    /// Not something this adapter converts; dropped with a warning.
    Skip(String),
    /// A supported entry with broken fields; fails the whole document.
    Invalid(String),
}

fn entry_to_node(entry: &YamlValue) -> Result<ProxyNode, EntryError> {
    let map = entry
        .as_mapping()
        .ok_or_else(|| EntryError::Skip("entry is not a mapping".into()))?;
    let kind = string_field(map, "type").unwrap_or_default();
    let protocol = match kind.to_ascii_lowercase().as_str() {
        "ss" | "shadowsocks" => Protocol::Shadowsocks,
        "vmess" => Protocol::Vmess,
        "vless" => Protocol::Vless,
        "trojan" => Protocol::Trojan,
        "socks5" | "socks" => Protocol::Socks,
        "http" => Protocol::Http,
        "hysteria2" => Protocol::Hysteria2,
        "tuic" => Protocol::Tuic,
        _ => return Err(EntryError::Skip(format!("unsupported type {kind:?}"))),
    };

    let name = string_field(map, "name")
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| EntryError::Invalid("missing name".into()))?;
    let server = string_field(map, "server")
        .ok_or_else(|| EntryError::Invalid(format!("{name}: missing server")))?;
    let port = u16_field(map, "port")
        .filter(|p| *p != 0)
        .ok_or_else(|| EntryError::Invalid(format!("{name}: missing or invalid port")))?;

    let mut node = ProxyNode::new(protocol, server, port);
    node.name = name.trim().to_string();
    node.password = string_field(map, "password");
    node.uuid = string_field(map, "uuid");
    node.username = string_field(map, "username");

    node.tls = bool_field(map, "tls").unwrap_or(false);
    node.sni = string_field(map, "sni").or_else(|| string_field(map, "servername"));
    node.skip_cert_verify = bool_field(map, "skip-cert-verify").unwrap_or(false);
    node.fingerprint = string_field(map, "client-fingerprint");
    if let Some(alpn) = map.get("alpn").and_then(YamlValue::as_sequence) {
        node.alpn = alpn.iter().filter_map(value_to_string).collect();
    }

    match protocol {
        Protocol::Shadowsocks => {
            if map.contains_key("plugin") {
                return Err(EntryError::Skip(format!("{}: plugins are not supported", node.name)));
            }
            node.method = string_field(map, "cipher");
        }
        Protocol::Vmess => {
            node.method = string_field(map, "cipher");
            node.alter_id = string_field(map, "alterId").and_then(|a| a.parse().ok());
        }
        Protocol::Vless => {
            node.flow = string_field(map, "flow");
            if let Some(opts) = mapping_field(map, "reality-opts") {
                let Some(public_key) = string_field(opts, "public-key") else {
                    return Err(EntryError::Invalid(format!(
                        "{}: missing reality public-key",
                        node.name
                    )));
                };
                node.reality = Some(Reality {
                    public_key,
                    short_id: string_field(opts, "short-id").unwrap_or_default(),
                });
            }
        }
        Protocol::Hysteria2 => {
            node.obfs = string_field(map, "obfs");
            node.obfs_password = string_field(map, "obfs-password");
        }
        Protocol::Tuic => {
            node.congestion_control = string_field(map, "congestion-controller");
        }
        Protocol::Trojan | Protocol::Socks | Protocol::Http => {}
    }

    apply_network(map, &mut node)?;
    Ok(node)
}

fn apply_network(map: &Mapping, node: &mut ProxyNode) -> Result<(), EntryError> {
    let Some(network) = string_field(map, "network") else {
        return Ok(());
    };
    match network.as_str() {
        "tcp" => {}
        "ws" => {
            node.transport = Some("ws".into());
            if let Some(opts) = mapping_field(map, "ws-opts") {
                node.path = string_field(opts, "path");
                node.host = mapping_field(opts, "headers").and_then(|h| string_field(h, "Host"));
            }
        }
        "grpc" => {
            node.transport = Some("grpc".into());
            node.grpc_service =
                mapping_field(map, "grpc-opts").and_then(|o| string_field(o, "grpc-service-name"));
        }
        "h2" => {
            node.transport = Some("h2".into());
            if let Some(opts) = mapping_field(map, "h2-opts") {
                node.path = string_field(opts, "path");
                node.host = first_string(opts, "host");
            }
        }
        "http" => {
            node.transport = Some("http".into());
            if let Some(opts) = mapping_field(map, "http-opts") {
                node.path = first_string(opts, "path");
                node.host = mapping_field(opts, "headers").and_then(|h| first_string(h, "Host"));
            }
        }
        other => {
            return Err(EntryError::Skip(format!(
                "{}: network {other:?} is not supported",
                node.name
            )))
        }
    }
    Ok(())
}

fn mapping_field<'a>(map: &'a Mapping, key: &str) -> Option<&'a Mapping> {
    map.get(key).and_then(YamlValue::as_mapping)
}

fn string_field(map: &Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(value_to_string).filter(|s| !s.is_empty())
}

/// A scalar, or the first element of a sequence.
fn first_string(map: &Mapping, key: &str) -> Option<String> {
    match map.get(key)? {
        YamlValue::Sequence(seq) => seq.iter().find_map(value_to_string),
        other => value_to_string(other),
    }
}

fn u16_field(map: &Mapping, key: &str) -> Option<u16> {
    map.get(key).and_then(|v| match v {
        YamlValue::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        YamlValue::String(s) => s.parse::<u16>().ok(),
        _ => None,
    })
}

fn bool_field(map: &Mapping, key: &str) -> Option<bool> {
    map.get(key).and_then(|v| match v {
        YamlValue::Bool(b) => Some(*b),
        YamlValue::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        YamlValue::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    })
}

fn value_to_string(v: &YamlValue) -> Option<String> {
    match v {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(yaml: &str) -> Vec<YamlValue> {
        parse_document(yaml).unwrap()
    }

    #[test]
    fn missing_or_null_proxies_is_not_a_match() {
        assert!(parse_document("port: 7890\n").is_err());
        assert!(parse_document("proxies:\n").is_err());
        assert!(parse_document("just a string").is_err());
    }

    #[test]
    fn empty_proxies_is_no_outbounds() {
        let list = entries("proxies: []\n");
        assert!(matches!(convert(&list), Err(ConfigError::NoOutbounds)));
    }

    #[test]
    fn converts_into_template() {
        let list = entries(
            r#"
proxies:
  - {name: a, type: ss, server: 1.2.3.4, port: 8388, cipher: aes-128-gcm, password: p}
  - name: b
    type: vmess
    server: v.example
    port: "443"
    uuid: u
    alterId: 0
    tls: true
    network: ws
    ws-opts: {path: /ray, headers: {Host: cdn.example}}
"#,
        );
        let doc = convert(&list).unwrap();
        let outbounds = doc["outbounds"].as_array().unwrap();
        let tags: Vec<&str> = outbounds.iter().map(|o| o["tag"].as_str().unwrap()).collect();
        assert_eq!(tags, vec!["select", "auto", "direct", "a", "b"]);
        assert_eq!(outbounds[0]["outbounds"], serde_json::json!(["auto", "a", "b"]));
        assert_eq!(outbounds[1]["outbounds"], serde_json::json!(["a", "b"]));
        assert_eq!(outbounds[4]["transport"]["headers"]["Host"], "cdn.example");
        assert_eq!(outbounds[4]["tls"]["enabled"], true);
    }

    #[test]
    fn unknown_types_are_skipped() {
        let list = entries(
            "proxies:\n  - {name: w, type: wireguard, server: h, port: 1}\n  - {name: t, type: trojan, server: h, port: 443, password: p}\n",
        );
        let doc = convert(&list).unwrap();
        assert_eq!(doc["outbounds"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn only_unsupported_is_conversion_error() {
        let list = entries("proxies:\n  - {name: w, type: wireguard, server: h, port: 1}\n");
        let err = convert(&list).unwrap_err();
        assert!(matches!(err, ConfigError::Conversion { provenance: Provenance::Yaml, .. }));
    }

    #[test]
    fn duplicate_names_fail() {
        let list = entries(
            "proxies:\n  - {name: x, type: trojan, server: a, port: 443, password: p}\n  - {name: x, type: trojan, server: b, port: 443, password: p}\n",
        );
        let err = convert(&list).unwrap_err();
        assert!(err.to_string().contains("duplicate proxy name"), "{err}");
    }

    #[test]
    fn missing_server_fails() {
        let list = entries("proxies:\n  - {name: x, type: trojan, port: 443, password: p}\n");
        let err = convert(&list).unwrap_err();
        assert!(err.to_string().contains("missing server"), "{err}");
    }

    #[test]
    fn vless_reality_opts() {
        let list = entries(
            r#"
proxies:
  - name: r
    type: vless
    server: r.example
    port: 443
    uuid: id
    flow: xtls-rprx-vision
    servername: www.apple.com
    client-fingerprint: chrome
    reality-opts: {public-key: KEY, short-id: "01"}
"#,
        );
        let doc = convert(&list).unwrap();
        let r = &doc["outbounds"][3];
        assert_eq!(r["tls"]["reality"]["public_key"], "KEY");
        assert_eq!(r["tls"]["reality"]["short_id"], "01");
        assert_eq!(r["tls"]["server_name"], "www.apple.com");
    }
}
