//! Intermediate proxy description shared by the share-link and proxy-list
//! adapters, and its rendering as a sing-box outbound object.

use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Outbound protocols the conversion adapters understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Shadowsocks,
    Vmess,
    Vless,
    Trojan,
    Socks,
    Http,
    Hysteria2,
    Tuic,
}

impl Protocol {
    /// The sing-box outbound `type` string.
    pub fn outbound_type(self) -> &'static str {
        match self {
            Self::Shadowsocks => "shadowsocks",
            Self::Vmess => "vmess",
            Self::Vless => "vless",
            Self::Trojan => "trojan",
            Self::Socks => "socks",
            Self::Http => "http",
            Self::Hysteria2 => "hysteria2",
            Self::Tuic => "tuic",
        }
    }

    /// Protocols that are only ever deployed behind TLS.
    fn implies_tls(self) -> bool {
        matches!(self, Self::Trojan | Self::Hysteria2 | Self::Tuic)
    }
}

/// REALITY handshake parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reality {
    pub public_key: String,
    pub short_id: String,
}

/// One proxy endpoint, before it becomes an outbound.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyNode {
    pub name: String,
    pub protocol: Protocol,
    pub server: String,
    pub port: u16,
    /// Shadowsocks cipher or VMess security.
    pub method: Option<String>,
    pub password: Option<String>,
    pub uuid: Option<String>,
    pub username: Option<String>,
    pub alter_id: Option<u32>,
    pub flow: Option<String>,
    /// Transport type (tcp, ws, grpc, http, h2, httpupgrade).
    pub transport: Option<String>,
    pub path: Option<String>,
    pub host: Option<String>,
    pub grpc_service: Option<String>,
    pub tls: bool,
    pub sni: Option<String>,
    pub alpn: Vec<String>,
    pub skip_cert_verify: bool,
    /// uTLS client fingerprint.
    pub fingerprint: Option<String>,
    pub reality: Option<Reality>,
    pub obfs: Option<String>,
    pub obfs_password: Option<String>,
    pub congestion_control: Option<String>,
}

impl ProxyNode {
    pub fn new(protocol: Protocol, server: impl Into<String>, port: u16) -> Self {
        Self {
            name: String::new(),
            protocol,
            server: server.into(),
            port,
            method: None,
            password: None,
            uuid: None,
            username: None,
            alter_id: None,
            flow: None,
            transport: None,
            path: None,
            host: None,
            grpc_service: None,
            tls: false,
            sni: None,
            alpn: Vec::new(),
            skip_cert_verify: false,
            fingerprint: None,
            reality: None,
            obfs: None,
            obfs_password: None,
            congestion_control: None,
        }
    }

    /// The tag used when the source gave no name.
    pub fn default_name(&self) -> String {
        if self.server.contains(':') {
            format!("[{}]:{}", self.server, self.port)
        } else {
            format!("{}:{}", self.server, self.port)
        }
    }

    fn tls_enabled(&self) -> bool {
        self.tls || self.reality.is_some() || self.protocol.implies_tls()
    }

    /// Render as a sing-box outbound, tagged with `self.name`.
    pub fn to_outbound(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), json!(self.protocol.outbound_type()));
        obj.insert("tag".into(), json!(self.name));
        obj.insert("server".into(), json!(self.server));
        obj.insert("server_port".into(), json!(self.port));

        match self.protocol {
            Protocol::Shadowsocks => {
                put(&mut obj, "method", &self.method);
                put(&mut obj, "password", &self.password);
            }
            Protocol::Vmess => {
                put(&mut obj, "uuid", &self.uuid);
                obj.insert(
                    "security".into(),
                    json!(self.method.as_deref().filter(|m| !m.is_empty()).unwrap_or("auto")),
                );
                obj.insert("alter_id".into(), json!(self.alter_id.unwrap_or(0)));
            }
            Protocol::Vless => {
                put(&mut obj, "uuid", &self.uuid);
                put(&mut obj, "flow", &self.flow);
                obj.insert("packet_encoding".into(), json!("xudp"));
            }
            Protocol::Trojan | Protocol::Hysteria2 => {
                put(&mut obj, "password", &self.password);
                if let Some(kind) = self.obfs.as_deref().filter(|o| !o.is_empty()) {
                    obj.insert(
                        "obfs".into(),
                        json!({
                            "type": kind,
                            "password": self.obfs_password.as_deref().unwrap_or(""),
                        }),
                    );
                }
            }
            Protocol::Tuic => {
                put(&mut obj, "uuid", &self.uuid);
                put(&mut obj, "password", &self.password);
                put(&mut obj, "congestion_control", &self.congestion_control);
            }
            Protocol::Socks => {
                obj.insert("version".into(), json!("5"));
                put(&mut obj, "username", &self.username);
                put(&mut obj, "password", &self.password);
            }
            Protocol::Http => {
                put(&mut obj, "username", &self.username);
                put(&mut obj, "password", &self.password);
            }
        }

        if self.tls_enabled() {
            obj.insert("tls".into(), self.tls_object());
        }
        if let Some(transport) = self.transport_object() {
            obj.insert("transport".into(), transport);
        }

        Value::Object(obj)
    }

    fn tls_object(&self) -> Value {
        let mut tls = json!({
            "enabled": true,
            "server_name": self.sni.as_deref().filter(|s| !s.is_empty()).unwrap_or(&self.server),
        });
        if self.skip_cert_verify {
            tls["insecure"] = json!(true);
        }
        if !self.alpn.is_empty() {
            tls["alpn"] = json!(self.alpn);
        }
        if let Some(fp) = self.fingerprint.as_deref().filter(|f| !f.is_empty()) {
            tls["utls"] = json!({"enabled": true, "fingerprint": fp});
        }
        if let Some(reality) = &self.reality {
            tls["reality"] = json!({
                "enabled": true,
                "public_key": reality.public_key,
                "short_id": reality.short_id,
            });
            // REALITY needs a uTLS handshake.
            if tls.get("utls").is_none() {
                tls["utls"] = json!({"enabled": true, "fingerprint": "chrome"});
            }
        }
        tls
    }

    fn transport_object(&self) -> Option<Value> {
        let path = self.path.as_deref().filter(|p| !p.is_empty()).unwrap_or("/");
        let host = self.host.as_deref().filter(|h| !h.is_empty());
        match self.transport.as_deref()? {
            "ws" => {
                let mut t = json!({"type": "ws", "path": path});
                if let Some(host) = host {
                    t["headers"] = json!({"Host": host});
                }
                Some(t)
            }
            "grpc" => Some(json!({
                "type": "grpc",
                "service_name": self.grpc_service.as_deref().unwrap_or(""),
            })),
            "http" | "h2" => {
                let mut t = json!({"type": "http", "path": path});
                if let Some(host) = host {
                    t["host"] = json!(host.split(',').map(str::trim).collect::<Vec<_>>());
                }
                Some(t)
            }
            "httpupgrade" => {
                let mut t = json!({"type": "httpupgrade", "path": path});
                if let Some(host) = host {
                    t["host"] = json!(host);
                }
                Some(t)
            }
            _ => None,
        }
    }
}

fn put(obj: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
        obj.insert(key.into(), json!(v));
    }
}

/// Make `name` distinct from everything in `taken` by appending ` (2)`,
/// ` (3)`, ... and record the result.
pub fn unique_tag(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{name} ({n})");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
