//! relation: library side of the `relation` binary.
//!
//! The transport skins over [`rl_core::SessionController`] live here so they
//! can be tested without a process: the typed envelope service, its
//! JSON-lines loop, and the flat string convention.

pub mod envelope;
pub mod flat;
pub mod logging;
pub mod panic;
pub mod serve;
pub mod service;
pub mod settings;

pub use service::CoreService;
pub use settings::{EngineArgs, Settings};
