//! Envelope service: one method per controller operation, every outcome
//! folded into an envelope instead of an error.

use crate::envelope::{
    BaseResponse, ParseRequest, ParseResponse, Request, Response, StartRequest, UrlTestRequest,
};
use rl_config::RawInput;
use rl_core::{EngineAdapter, EngineSetup, SessionController};
use rl_types::SessionError;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct CoreService<A: EngineAdapter> {
    controller: Arc<SessionController<A>>,
}

impl<A: EngineAdapter> CoreService<A> {
    pub fn new(controller: Arc<SessionController<A>>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<SessionController<A>> {
        &self.controller
    }

    pub fn setup(&self, request: &EngineSetup) -> BaseResponse {
        lifecycle("setup", self.controller.setup(request))
    }

    pub fn parse(&self, request: &ParseRequest) -> ParseResponse {
        let raw = RawInput::from_parts(request.content.as_str(), &request.temp_path);
        match self.controller.resolve(&raw) {
            Ok(config) => {
                debug!(provenance = %config.provenance(), "parse succeeded");
                ParseResponse::ok(config.into_string())
            }
            Err(e) => {
                error!(error = %e, "parse failed");
                ParseResponse::failed(e.to_string())
            }
        }
    }

    pub fn start(&self, request: &StartRequest) -> BaseResponse {
        lifecycle(
            "start",
            self.controller.start(&start_input(request), request.memory_limit),
        )
    }

    pub fn stop(&self) -> BaseResponse {
        lifecycle("stop", self.controller.stop())
    }

    pub fn restart(&self, request: &StartRequest) -> BaseResponse {
        lifecycle(
            "restart",
            self.controller.restart(&start_input(request), request.memory_limit),
        )
    }

    /// On success the message holds the probes as a JSON array.
    pub fn url_test(&self, request: &UrlTestRequest) -> BaseResponse {
        match self.controller.url_test(&request.tag) {
            Ok(probes) => match serde_json::to_string(&probes) {
                Ok(text) => BaseResponse::ok_with(text),
                Err(e) => BaseResponse::failed(format!("encode probes: {e}")),
            },
            Err(e) => lifecycle("url_test", Err(e)),
        }
    }

    pub fn handle(&self, request: Request) -> Response {
        info!(method = request.method(), "request");
        match request {
            Request::Setup(r) => self.setup(&r).into(),
            Request::Parse(r) => self.parse(&r).into(),
            Request::Start(r) => self.start(&r).into(),
            Request::Stop => self.stop().into(),
            Request::Restart(r) => self.restart(&r).into(),
            Request::UrlTest(r) => self.url_test(&r).into(),
        }
    }

    /// One JSON-lines exchange. Malformed lines and unknown methods answer a
    /// failed [`BaseResponse`].
    pub fn handle_line(&self, line: &str) -> String {
        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request),
            Err(e) => {
                warn!(error = %e, "malformed request");
                BaseResponse::failed(format!("malformed request: {e}")).into()
            }
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            json!({"ok": false, "message": format!("encode response: {e}")}).to_string()
        })
    }
}

fn start_input(request: &StartRequest) -> RawInput {
    RawInput::from_parts(request.content.as_str(), &request.config_path)
}

fn lifecycle(operation: &'static str, result: Result<(), SessionError>) -> BaseResponse {
    match &result {
        Ok(()) => {}
        Err(SessionError::NotRunning) => warn!(operation, "engine is not running"),
        Err(e) => error!(operation, kind = e.kind(), error = %e, "operation failed"),
    }
    BaseResponse::from_result(result)
}
