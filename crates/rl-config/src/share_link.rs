//! Share-link adapter.
//!
//! Accepts newline-separated proxy URIs (`ss://`, `vmess://`, `vless://`,
//! `trojan://`, `hysteria2://`/`hy2://`, `tuic://`, `socks://`/`socks5://`),
//! or a base64 blob of such a list as served by subscription endpoints.
//!
//! Line rules: blank lines and lines starting with `#` or `//` are skipped;
//! a line with an unrecognized scheme means the content is not a link list
//! at all; a recognized link that fails to parse is dropped with a warning.

use crate::node::{unique_tag, ProxyNode, Protocol, Reality};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

/// Why a single link could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("unsupported scheme")]
    UnknownScheme,
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {0}")]
    Invalid(&'static str),
    #[error("{0} is not supported")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Shadowsocks,
    Vmess,
    Vless,
    Trojan,
    Hysteria2,
    Tuic,
    Socks,
}

impl Scheme {
    fn detect(line: &str) -> Option<(Self, &str)> {
        let (scheme, rest) = line.split_once("://")?;
        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "ss" => Self::Shadowsocks,
            "vmess" => Self::Vmess,
            "vless" => Self::Vless,
            "trojan" => Self::Trojan,
            "hysteria2" | "hy2" => Self::Hysteria2,
            "tuic" => Self::Tuic,
            "socks" | "socks5" => Self::Socks,
            _ => return None,
        };
        Some((scheme, rest))
    }
}

/// Parse a whole link list.
///
/// The `Err` string is the reason recorded for this branch when the content
/// is not a link list.
pub fn parse_links(content: &str) -> Result<Vec<ProxyNode>, String> {
    let lines: Vec<(usize, &str)> = significant_lines(content).collect();
    if lines.is_empty() {
        return Err("no share links".into());
    }
    if lines.iter().any(|(_, l)| Scheme::detect(l).is_some()) {
        return convert_lines(&lines);
    }

    let packed: String = content.split_whitespace().collect();
    let decoded = decode_base64(&packed).ok_or("no supported share-link scheme")?;
    let text = String::from_utf8(decoded).map_err(|_| "decoded subscription is not UTF-8")?;
    let lines: Vec<(usize, &str)> = significant_lines(&text).collect();
    if lines.is_empty() {
        return Err("decoded subscription is empty".into());
    }
    convert_lines(&lines)
}

/// Parse one share link.
pub fn parse_link(line: &str) -> Result<ProxyNode, LinkError> {
    let (scheme, rest) = Scheme::detect(line.trim()).ok_or(LinkError::UnknownScheme)?;
    match scheme {
        Scheme::Shadowsocks => parse_shadowsocks(rest),
        Scheme::Vmess => parse_vmess(rest),
        Scheme::Vless => parse_vless(rest),
        Scheme::Trojan => parse_trojan(rest),
        Scheme::Hysteria2 => parse_hysteria2(rest),
        Scheme::Tuic => parse_tuic(rest),
        Scheme::Socks => parse_socks(rest),
    }
}

/// Wrap converted nodes as `{"outbounds": [...]}`, giving each a unique tag.
pub fn to_document(nodes: Vec<ProxyNode>) -> Value {
    let mut taken = HashSet::new();
    let outbounds: Vec<Value> = nodes
        .into_iter()
        .map(|mut node| {
            let base = if node.name.trim().is_empty() {
                node.default_name()
            } else {
                node.name.trim().to_string()
            };
            node.name = unique_tag(&base, &mut taken);
            node.to_outbound()
        })
        .collect();
    json!({ "outbounds": outbounds })
}

fn significant_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#') && !l.starts_with("//"))
}

fn convert_lines(lines: &[(usize, &str)]) -> Result<Vec<ProxyNode>, String> {
    let mut nodes = Vec::with_capacity(lines.len());
    for &(number, line) in lines {
        if Scheme::detect(line).is_none() {
            return Err(format!("line {number}: not a supported share link"));
        }
        match parse_link(line) {
            Ok(node) => nodes.push(node),
            Err(e) => warn!(line = number, error = %e, "skipping share link"),
        }
    }
    if nodes.is_empty() {
        return Err("no share link could be converted".into());
    }
    Ok(nodes)
}

/// Decode base64 in any of the common alphabets, padded or not.
pub(crate) fn decode_base64(input: &str) -> Option<Vec<u8>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
        .into_iter()
        .find_map(|engine| engine.decode(trimmed).ok())
}

fn decode_base64_text(input: &str) -> Option<String> {
    decode_base64(input).and_then(|b| String::from_utf8(b).ok())
}

fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// `[userinfo@]host:port[/path][?query][#fragment]`, decoded.
#[derive(Debug)]
struct Link {
    userinfo: Option<String>,
    host: String,
    port: u16,
    query: HashMap<String, String>,
    name: String,
}

impl Link {
    fn parse(rest: &str) -> Result<Self, LinkError> {
        let (main, name) = match rest.split_once('#') {
            Some((main, fragment)) => (main, percent_decode(fragment)),
            None => (rest, String::new()),
        };
        let (main, query) = main.split_once('?').unwrap_or((main, ""));
        let (userinfo, authority) = match main.rsplit_once('@') {
            Some((u, a)) => (Some(percent_decode(u)), a),
            None => (None, main),
        };
        let authority = authority.split('/').next().unwrap_or_default();
        let (host, port) = split_host_port(authority)?;

        let query = query
            .split('&')
            .filter(|p| !p.is_empty())
            .map(|p| {
                let (k, v) = p.split_once('=').unwrap_or((p, ""));
                (k.to_string(), percent_decode(v))
            })
            .collect();

        Ok(Self {
            userinfo: userinfo.filter(|u| !u.is_empty()),
            host,
            port,
            query,
            name,
        })
    }

    fn param(&self, key: &str) -> Option<String> {
        self.query.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn flag(&self, keys: &[&str]) -> bool {
        keys.iter()
            .filter_map(|k| self.query.get(*k))
            .any(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    }

    fn alpn(&self) -> Vec<String> {
        self.param("alpn")
            .map(|a| {
                a.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn node(&self, protocol: Protocol) -> ProxyNode {
        let mut node = ProxyNode::new(protocol, self.host.clone(), self.port);
        node.name = self.name.clone();
        node.sni = self.param("sni").or_else(|| self.param("peer"));
        node.alpn = self.alpn();
        node.skip_cert_verify = self.flag(&["allowInsecure", "insecure", "allow_insecure"]);
        node.fingerprint = self.param("fp");
        node
    }

    /// Copy `type`/`path`/`host`/`serviceName` onto the node.
    fn apply_transport(&self, node: &mut ProxyNode) -> Result<(), LinkError> {
        node.transport = checked_transport(self.param("type"))?;
        node.path = self.param("path");
        node.host = self.param("host");
        node.grpc_service = self.param("serviceName");
        Ok(())
    }
}

fn split_host_port(authority: &str) -> Result<(String, u16), LinkError> {
    let (host, port) = if let Some(v6) = authority.strip_prefix('[') {
        let (host, rest) = v6.split_once(']').ok_or(LinkError::Invalid("host"))?;
        let port = rest.strip_prefix(':').ok_or(LinkError::Missing("port"))?;
        (host, port)
    } else {
        authority.rsplit_once(':').ok_or(LinkError::Missing("port"))?
    };
    if host.is_empty() {
        return Err(LinkError::Missing("host"));
    }
    let port: u16 = port.parse().map_err(|_| LinkError::Invalid("port"))?;
    if port == 0 {
        return Err(LinkError::Invalid("port"));
    }
    Ok((host.to_string(), port))
}

fn checked_transport(kind: Option<String>) -> Result<Option<String>, LinkError> {
    match kind.as_deref() {
        None | Some("tcp") | Some("none") => Ok(None),
        Some("ws" | "grpc" | "http" | "h2" | "httpupgrade") => Ok(kind),
        Some(other) => Err(LinkError::Unsupported(format!("transport {other}"))),
    }
}

fn parse_shadowsocks(rest: &str) -> Result<ProxyNode, LinkError> {
    // Legacy form: base64("method:password@host:port")#name
    let body = rest.split(['#', '?']).next().unwrap_or_default();
    let expanded;
    let rest = if body.contains('@') {
        rest
    } else {
        let decoded = decode_base64_text(body).ok_or(LinkError::Invalid("base64 payload"))?;
        expanded = format!("{decoded}{}", &rest[body.len()..]);
        expanded.as_str()
    };

    let link = Link::parse(rest)?;
    if link.param("plugin").is_some() {
        return Err(LinkError::Unsupported("shadowsocks plugin".into()));
    }
    let userinfo = link.userinfo.as_deref().ok_or(LinkError::Missing("credentials"))?;
    let credentials = if userinfo.contains(':') {
        userinfo.to_string()
    } else {
        decode_base64_text(userinfo).ok_or(LinkError::Invalid("credentials"))?
    };
    let (method, password) = credentials
        .split_once(':')
        .ok_or(LinkError::Invalid("credentials"))?;

    let mut node = link.node(Protocol::Shadowsocks);
    node.method = Some(method.to_string());
    node.password = Some(password.to_string());
    node.sni = None;
    Ok(node)
}

fn json_str(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_vmess(rest: &str) -> Result<ProxyNode, LinkError> {
    let payload = rest.split('#').next().unwrap_or_default();
    let text = decode_base64_text(payload).ok_or(LinkError::Invalid("base64 payload"))?;
    let v: Value = serde_json::from_str(&text).map_err(|_| LinkError::Invalid("vmess json"))?;

    let server = json_str(&v, "add").ok_or(LinkError::Missing("address"))?;
    let port: u16 = json_str(&v, "port")
        .ok_or(LinkError::Missing("port"))?
        .parse()
        .map_err(|_| LinkError::Invalid("port"))?;
    if port == 0 {
        return Err(LinkError::Invalid("port"));
    }

    let mut node = ProxyNode::new(Protocol::Vmess, server, port);
    node.name = json_str(&v, "ps").unwrap_or_default();
    node.uuid = Some(json_str(&v, "id").ok_or(LinkError::Missing("id"))?);
    node.alter_id = json_str(&v, "aid").and_then(|a| a.parse().ok());
    node.method = json_str(&v, "scy");
    node.transport = checked_transport(json_str(&v, "net"))?;
    node.path = json_str(&v, "path");
    node.host = json_str(&v, "host");
    if node.transport.as_deref() == Some("grpc") {
        node.grpc_service = node.path.take();
    }
    node.tls = json_str(&v, "tls").is_some_and(|t| t == "tls");
    node.sni = json_str(&v, "sni");
    node.fingerprint = json_str(&v, "fp");
    node.alpn = json_str(&v, "alpn")
        .map(|a| a.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();
    Ok(node)
}

fn parse_vless(rest: &str) -> Result<ProxyNode, LinkError> {
    let link = Link::parse(rest)?;
    let uuid = link.userinfo.clone().ok_or(LinkError::Missing("uuid"))?;

    let mut node = link.node(Protocol::Vless);
    node.uuid = Some(uuid);
    node.flow = link.param("flow");
    link.apply_transport(&mut node)?;

    match link.param("security").as_deref() {
        None | Some("none") => {}
        Some("tls") => node.tls = true,
        Some("reality") => {
            node.reality = Some(Reality {
                public_key: link.param("pbk").ok_or(LinkError::Missing("reality public key"))?,
                short_id: link.param("sid").unwrap_or_default(),
            });
        }
        Some(other) => return Err(LinkError::Unsupported(format!("security {other}"))),
    }
    Ok(node)
}

fn parse_trojan(rest: &str) -> Result<ProxyNode, LinkError> {
    let link = Link::parse(rest)?;
    let password = link.userinfo.clone().ok_or(LinkError::Missing("password"))?;

    let mut node = link.node(Protocol::Trojan);
    node.password = Some(password);
    link.apply_transport(&mut node)?;
    Ok(node)
}

fn parse_hysteria2(rest: &str) -> Result<ProxyNode, LinkError> {
    let link = Link::parse(rest)?;

    let mut node = link.node(Protocol::Hysteria2);
    node.password = link.userinfo.clone();
    node.obfs = link.param("obfs");
    node.obfs_password = link.param("obfs-password");
    Ok(node)
}

fn parse_tuic(rest: &str) -> Result<ProxyNode, LinkError> {
    let link = Link::parse(rest)?;
    let userinfo = link.userinfo.as_deref().ok_or(LinkError::Missing("credentials"))?;
    let (uuid, password) = userinfo.split_once(':').unwrap_or((userinfo, ""));

    let mut node = link.node(Protocol::Tuic);
    node.uuid = Some(uuid.to_string());
    node.password = Some(password.to_string());
    node.congestion_control = link.param("congestion_control");
    Ok(node)
}

fn parse_socks(rest: &str) -> Result<ProxyNode, LinkError> {
    let link = Link::parse(rest)?;

    let mut node = link.node(Protocol::Socks);
    node.sni = None;
    if let Some(userinfo) = link.userinfo.as_deref() {
        let credentials = if userinfo.contains(':') {
            userinfo.to_string()
        } else {
            decode_base64_text(userinfo).unwrap_or_else(|| userinfo.to_string())
        };
        let (user, pass) = credentials.split_once(':').unwrap_or((&credentials, ""));
        node.username = Some(user.to_string());
        node.password = Some(pass.to_string());
    }
    Ok(node)
}
