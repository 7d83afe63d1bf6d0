//! Engine adapter seam.

use rl_config::{CanonicalConfig, ConfigChecker};
use rl_types::EngineError;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Paths and switches handed to an engine before its first start.
///
/// Empty strings mean "keep the adapter's current value".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSetup {
    pub base_path: String,
    pub working_path: String,
    pub temp_path: String,
    pub status_port: u16,
    pub debug: bool,
}

/// Outcome of probing one outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Probe {
    pub tag: String,
    /// Connect latency; `None` when the outbound was unreachable.
    #[serde(with = "millis")]
    pub delay: Option<Duration>,
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }
}

/// A constructed engine. Owned by exactly one controller slot.
pub trait EngineInstance: Send {
    fn start(&mut self) -> Result<(), EngineError>;

    fn close(&mut self) -> Result<(), EngineError>;

    /// Probe the outbound (or each member of the group) tagged `tag`.
    fn url_test(&mut self, tag: &str) -> Result<Vec<Probe>, EngineError> {
        let _ = tag;
        Err(EngineError::Unsupported("url test"))
    }
}

/// Factory and policy surface of an engine. Also the authoritative config
/// checker for the documents it will run.
pub trait EngineAdapter: ConfigChecker + Send + Sync {
    fn new_instance(&self, config: &CanonicalConfig) -> Result<Box<dyn EngineInstance>, EngineError>;

    /// Apply the memory-limit policy to instances started from now on.
    fn set_memory_limit(&self, enabled: bool);

    /// Best-effort hint to give memory back after an instance is dropped.
    fn reclaim_memory(&self) {}

    /// Wait between the stop and start halves of a restart.
    fn settle(&self, delay: Duration) {
        thread::sleep(delay);
    }

    fn setup(&self, setup: &EngineSetup) -> Result<(), EngineError> {
        let _ = setup;
        Ok(())
    }
}
