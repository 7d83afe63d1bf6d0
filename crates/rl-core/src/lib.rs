//! rl-core: engine session lifecycle.
//!
//! [`SessionController`] owns at most one running engine instance and
//! serializes start/stop/restart through a single lock. Engines plug in via
//! [`EngineAdapter`] / [`EngineInstance`]; [`ProcessEngine`] drives an
//! external sing-box compatible binary.

pub mod engine;
pub mod process;
pub mod session;

pub use engine::{EngineAdapter, EngineInstance, EngineSetup, Probe};
pub use process::{ProcessEngine, ProcessSettings};
pub use session::{SessionController, SessionState, SETTLE_DELAY};
