//! Typed request/response envelopes of the core service.
//!
//! Lifecycle calls answer a [`BaseResponse`]; parse answers a
//! [`ParseResponse`]. On the JSON-lines transport a request is
//! `{"method": "<name>", "params": {...}}`; `stop` takes no params.

use rl_core::EngineSetup;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseResponse {
    pub ok: bool,
    #[serde(default)]
    pub message: String,
}

impl BaseResponse {
    pub fn ok() -> Self {
        Self::ok_with(String::new())
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    pub fn from_result<E: Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseFlag {
    Ok,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResponse {
    pub response_flag: ResponseFlag,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message: String,
}

impl ParseResponse {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            response_flag: ResponseFlag::Ok,
            content: content.into(),
            message: String::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            response_flag: ResponseFlag::Failed,
            content: String::new(),
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.response_flag == ResponseFlag::Ok
    }
}

/// Inline content, or a file to read when the content is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseRequest {
    pub content: String,
    pub temp_path: String,
}

/// `config_path` names the file to run; `content`, when non-empty, is used
/// instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StartRequest {
    pub config_path: String,
    pub content: String,
    pub memory_limit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlTestRequest {
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum Request {
    Setup(EngineSetup),
    Parse(ParseRequest),
    Start(StartRequest),
    Stop,
    Restart(StartRequest),
    UrlTest(UrlTestRequest),
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::Parse(_) => "parse",
            Self::Start(_) => "start",
            Self::Stop => "stop",
            Self::Restart(_) => "restart",
            Self::UrlTest(_) => "url_test",
        }
    }
}

/// Wire shape of a request line. Missing `params` reads as `{}`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RequestFrame {
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

impl RequestFrame {
    fn into_request(self) -> Result<Request, String> {
        let method = self.method.as_str();
        let params = match self.params {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(v) => v,
        };
        match method {
            "setup" => decode(method, params).map(Request::Setup),
            "parse" => decode(method, params).map(Request::Parse),
            "start" => decode(method, params).map(Request::Start),
            "restart" => decode(method, params).map(Request::Restart),
            "url_test" => decode(method, params).map(Request::UrlTest),
            "stop" => match params {
                Value::Object(m) if m.is_empty() => Ok(Request::Stop),
                _ => Err("stop takes no params".into()),
            },
            other => Err(format!("unknown method {other:?}")),
        }
    }
}

fn decode<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, String> {
    serde_json::from_value(params).map_err(|e| format!("{method} params: {e}"))
}

impl<'de> Deserialize<'de> for Request {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RequestFrame::deserialize(deserializer)?
            .into_request()
            .map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Base(BaseResponse),
    Parse(ParseResponse),
}

impl From<BaseResponse> for Response {
    fn from(r: BaseResponse) -> Self {
        Self::Base(r)
    }
}

impl From<ParseResponse> for Response {
    fn from(r: ParseResponse) -> Self {
        Self::Parse(r)
    }
}
