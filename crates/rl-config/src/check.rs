//! Config checking.
//!
//! [`ConfigChecker`] is the seam the resolver validates through. The engine
//! adapter is the authoritative implementation (it asks the engine itself);
//! [`StructuralChecker`] is an offline checker covering the document shape,
//! tag uniqueness and tag references.

use rl_types::{CheckError, IssueCode};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Decides whether a canonical document is acceptable to the engine.
///
/// Implementations must be pure with respect to the content: same bytes,
/// same verdict.
pub trait ConfigChecker: Send + Sync {
    fn check(&self, content: &[u8]) -> Result<(), CheckError>;
}

/// One structural problem, located by JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub code: IssueCode,
    pub ptr: String,
    pub msg: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.ptr, self.msg, self.code)
    }
}

fn emit_issue(issues: &mut Vec<Issue>, code: IssueCode, ptr: impl Into<String>, msg: impl Into<String>) {
    issues.push(Issue {
        code,
        ptr: ptr.into(),
        msg: msg.into(),
    });
}

const ROOT_KEYS: &[&str] = &[
    "$schema",
    "log",
    "dns",
    "ntp",
    "certificate",
    "endpoints",
    "inbounds",
    "outbounds",
    "route",
    "experimental",
    "services",
];

const OBJECT_SECTIONS: &[&str] = &["log", "dns", "ntp", "certificate", "route", "experimental"];

const OUTBOUND_TYPES: &[&str] = &[
    "direct",
    "block",
    "dns",
    "selector",
    "urltest",
    "socks",
    "http",
    "shadowsocks",
    "vmess",
    "trojan",
    "naive",
    "wireguard",
    "hysteria",
    "shadowtls",
    "vless",
    "tuic",
    "hysteria2",
    "anytls",
    "tor",
    "ssh",
];

/// Outbound types that dial a remote server and need `server`/`server_port`.
const PROXY_TYPES: &[&str] = &[
    "socks",
    "http",
    "shadowsocks",
    "vmess",
    "trojan",
    "naive",
    "hysteria",
    "shadowtls",
    "vless",
    "tuic",
    "hysteria2",
    "anytls",
    "ssh",
];

const GROUP_TYPES: &[&str] = &["selector", "urltest"];

/// Offline shape checker for sing-box documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralChecker {
    allow_unknown: bool,
}

impl StructuralChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tolerate unknown top-level keys instead of reporting them.
    pub fn allow_unknown(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    /// Every issue found in `doc`, in document order.
    pub fn issues(&self, doc: &Value) -> Vec<Issue> {
        let mut issues = Vec::new();
        let Some(root) = doc.as_object() else {
            emit_issue(&mut issues, IssueCode::TypeMismatch, "/", "root must be an object");
            return issues;
        };

        for key in root.keys() {
            if !ROOT_KEYS.contains(&key.as_str()) {
                if self.allow_unknown {
                    tracing::warn!(field = %key, "ignoring unknown top-level field");
                } else {
                    emit_issue(&mut issues, IssueCode::UnknownField, format!("/{key}"), "unknown field");
                }
            }
        }
        for key in OBJECT_SECTIONS {
            if let Some(v) = root.get(*key) {
                if !v.is_object() {
                    emit_issue(&mut issues, IssueCode::TypeMismatch, format!("/{key}"), "must be an object");
                }
            }
        }

        let inbounds = section_items(root, "inbounds", &mut issues);
        let endpoints = section_items(root, "endpoints", &mut issues);
        let outbounds = section_items(root, "outbounds", &mut issues);

        let mut inbound_tags = HashSet::new();
        for (i, inbound) in &inbounds {
            let ptr = format!("/inbounds/{i}");
            check_type_and_tag(inbound, &ptr, &mut inbound_tags, &mut issues);
            if let Some(port) = inbound.get("listen_port") {
                check_port(port, &format!("{ptr}/listen_port"), &mut issues);
            }
        }

        // Outbounds and endpoints share one tag namespace.
        let mut outbound_tags = HashSet::new();
        for (i, endpoint) in &endpoints {
            check_type_and_tag(endpoint, &format!("/endpoints/{i}"), &mut outbound_tags, &mut issues);
        }
        for (i, outbound) in &outbounds {
            let ptr = format!("/outbounds/{i}");
            let kind = check_type_and_tag(outbound, &ptr, &mut outbound_tags, &mut issues);
            let Some(kind) = kind else { continue };
            if !OUTBOUND_TYPES.contains(&kind) {
                emit_issue(
                    &mut issues,
                    IssueCode::InvalidEnum,
                    format!("{ptr}/type"),
                    format!("unknown outbound type {kind:?}"),
                );
                continue;
            }
            if PROXY_TYPES.contains(&kind) {
                check_server(outbound, &ptr, &mut issues);
            }
        }

        for (i, outbound) in &outbounds {
            let is_group = outbound
                .get("type")
                .and_then(Value::as_str)
                .is_some_and(|t| GROUP_TYPES.contains(&t));
            if is_group {
                check_group(outbound, &format!("/outbounds/{i}"), &outbound_tags, &mut issues);
            }
        }

        check_references(root, &outbound_tags, &mut issues);
        issues
    }
}

impl ConfigChecker for StructuralChecker {
    fn check(&self, content: &[u8]) -> Result<(), CheckError> {
        let doc: Value =
            serde_json::from_slice(content).map_err(|e| CheckError::new(format!("decode config: {e}")))?;
        let issues = self.issues(&doc);
        if issues.is_empty() {
            return Ok(());
        }
        let joined = issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        Err(CheckError::new(joined))
    }
}

/// Objects of an array section, with their indices. Non-objects are reported.
fn section_items<'a>(
    root: &'a Map<String, Value>,
    key: &str,
    issues: &mut Vec<Issue>,
) -> Vec<(usize, &'a Map<String, Value>)> {
    let Some(section) = root.get(key) else {
        return Vec::new();
    };
    let Some(items) = section.as_array() else {
        emit_issue(issues, IssueCode::TypeMismatch, format!("/{key}"), "must be an array");
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match item.as_object() {
            Some(obj) => Some((i, obj)),
            None => {
                emit_issue(issues, IssueCode::TypeMismatch, format!("/{key}/{i}"), "must be an object");
                None
            }
        })
        .collect()
}

/// Check `type` and `tag`; returns the type when it is a string.
fn check_type_and_tag<'a>(
    item: &'a Map<String, Value>,
    ptr: &str,
    tags: &mut HashSet<String>,
    issues: &mut Vec<Issue>,
) -> Option<&'a str> {
    let kind = match item.get("type") {
        None => {
            emit_issue(issues, IssueCode::MissingRequired, format!("{ptr}/type"), "missing type");
            None
        }
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            emit_issue(issues, IssueCode::TypeMismatch, format!("{ptr}/type"), "type must be a string");
            None
        }
    };
    match item.get("tag") {
        None => {}
        Some(Value::String(tag)) => {
            if !tags.insert(tag.clone()) {
                emit_issue(
                    issues,
                    IssueCode::DuplicateTag,
                    format!("{ptr}/tag"),
                    format!("duplicate tag {tag:?}"),
                );
            }
        }
        Some(_) => {
            emit_issue(issues, IssueCode::TypeMismatch, format!("{ptr}/tag"), "tag must be a string");
        }
    }
    kind
}

fn check_port(port: &Value, ptr: &str, issues: &mut Vec<Issue>) {
    match port.as_u64() {
        Some(p) if (1..=65535).contains(&p) => {}
        Some(p) => emit_issue(issues, IssueCode::RangeExceeded, ptr, format!("port {p} out of range")),
        None => emit_issue(issues, IssueCode::TypeMismatch, ptr, "port must be an integer"),
    }
}

fn check_server(outbound: &Map<String, Value>, ptr: &str, issues: &mut Vec<Issue>) {
    match outbound.get("server").and_then(Value::as_str) {
        Some(s) if !s.is_empty() => {}
        _ => emit_issue(issues, IssueCode::MissingRequired, format!("{ptr}/server"), "missing server"),
    }
    match outbound.get("server_port") {
        Some(port) => check_port(port, &format!("{ptr}/server_port"), issues),
        None => emit_issue(
            issues,
            IssueCode::MissingRequired,
            format!("{ptr}/server_port"),
            "missing server_port",
        ),
    }
}

fn check_group(
    group: &Map<String, Value>,
    ptr: &str,
    known: &HashSet<String>,
    issues: &mut Vec<Issue>,
) {
    let members = match group.get("outbounds").and_then(Value::as_array) {
        Some(m) if !m.is_empty() => m,
        _ => {
            emit_issue(
                issues,
                IssueCode::MissingRequired,
                format!("{ptr}/outbounds"),
                "group needs at least one member",
            );
            return;
        }
    };
    for (j, member) in members.iter().enumerate() {
        let mptr = format!("{ptr}/outbounds/{j}");
        match member.as_str() {
            Some(tag) if known.contains(tag) => {}
            Some(tag) => emit_issue(
                issues,
                IssueCode::DanglingReference,
                mptr,
                format!("unknown outbound {tag:?}"),
            ),
            None => emit_issue(issues, IssueCode::TypeMismatch, mptr, "member must be a string"),
        }
    }
    if let Some(default) = group.get("default").and_then(Value::as_str) {
        if !members.iter().any(|m| m.as_str() == Some(default)) {
            emit_issue(
                issues,
                IssueCode::DanglingReference,
                format!("{ptr}/default"),
                format!("default {default:?} is not a member"),
            );
        }
    }
}

fn check_reference(value: Option<&Value>, ptr: String, known: &HashSet<String>, issues: &mut Vec<Issue>) {
    if let Some(tag) = value.and_then(Value::as_str) {
        if !known.contains(tag) {
            emit_issue(issues, IssueCode::DanglingReference, ptr, format!("unknown outbound {tag:?}"));
        }
    }
}

fn check_references(root: &Map<String, Value>, known: &HashSet<String>, issues: &mut Vec<Issue>) {
    if let Some(route) = root.get("route") {
        check_reference(route.get("final"), "/route/final".into(), known, issues);
        if let Some(rules) = route.get("rules").and_then(Value::as_array) {
            for (i, rule) in rules.iter().enumerate() {
                check_reference(rule.get("outbound"), format!("/route/rules/{i}/outbound"), known, issues);
            }
        }
    }
    if let Some(servers) = root
        .get("dns")
        .and_then(|d| d.get("servers"))
        .and_then(Value::as_array)
    {
        for (i, server) in servers.iter().enumerate() {
            check_reference(server.get("detour"), format!("/dns/servers/{i}/detour"), known, issues);
        }
    }
}
