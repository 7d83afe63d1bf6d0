//! Flat call convention: every call answers a single string, `""` on
//! success or the error text. Errors are logged before they are returned.
//!
//! `parse` is the exception: it answers the canonical document on success.

use rl_config::RawInput;
use rl_core::{EngineAdapter, EngineSetup, SessionController};
use std::fmt::Display;
use tracing::error;

pub const SUCCESS: &str = "";

fn error_or_not<E: Display>(operation: &'static str, result: Result<(), E>) -> String {
    match result {
        Ok(()) => SUCCESS.to_string(),
        Err(e) => {
            let text = e.to_string();
            error!(operation, "{text}");
            text
        }
    }
}

pub fn setup<A: EngineAdapter>(
    controller: &SessionController<A>,
    base_path: &str,
    working_path: &str,
    temp_path: &str,
    status_port: u16,
    debug: bool,
) -> String {
    let setup = EngineSetup {
        base_path: base_path.to_string(),
        working_path: working_path.to_string(),
        temp_path: temp_path.to_string(),
        status_port,
        debug,
    };
    error_or_not("setup", controller.setup(&setup))
}

pub fn parse<A: EngineAdapter>(controller: &SessionController<A>, content: &str, temp_path: &str) -> String {
    match controller.resolve(&RawInput::from_parts(content, temp_path)) {
        Ok(config) => config.into_string(),
        Err(e) => {
            let text = e.to_string();
            error!(operation = "parse", "{text}");
            text
        }
    }
}

pub fn start<A: EngineAdapter>(controller: &SessionController<A>, config_path: &str, memory_limit: bool) -> String {
    error_or_not(
        "start",
        controller.start(&RawInput::from_parts("", config_path), memory_limit),
    )
}

pub fn restart<A: EngineAdapter>(controller: &SessionController<A>, config_path: &str, memory_limit: bool) -> String {
    error_or_not(
        "restart",
        controller.restart(&RawInput::from_parts("", config_path), memory_limit),
    )
}

pub fn stop<A: EngineAdapter>(controller: &SessionController<A>) -> String {
    error_or_not("stop", controller.stop())
}

pub fn url_test<A: EngineAdapter>(controller: &SessionController<A>, tag: &str) -> String {
    error_or_not("url_test", controller.url_test(tag).map(|_| ()))
}
