#![allow(dead_code)]

use parking_lot::Mutex;
use rl_config::{CanonicalConfig, ConfigChecker, StructuralChecker};
use rl_core::{EngineAdapter, EngineInstance, EngineSetup, Probe, SessionController};
use rl_types::{CheckError, EngineError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const NATIVE: &str = r#"{"outbounds":[{"type":"direct","tag":"direct"}]}"#;

#[derive(Default)]
pub struct Shared {
    pub live: AtomicUsize,
    pub fail_start: AtomicBool,
    pub setups: Mutex<Vec<EngineSetup>>,
}

/// In-memory engine; configs are checked structurally.
#[derive(Default, Clone)]
pub struct FakeEngine(pub Arc<Shared>);

struct FakeInstance(Arc<Shared>);

impl ConfigChecker for FakeEngine {
    fn check(&self, content: &[u8]) -> Result<(), CheckError> {
        StructuralChecker::new().check(content)
    }
}

impl EngineAdapter for FakeEngine {
    fn new_instance(&self, _: &CanonicalConfig) -> Result<Box<dyn EngineInstance>, EngineError> {
        self.0.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeInstance(self.0.clone())))
    }

    fn set_memory_limit(&self, _: bool) {}

    fn settle(&self, _: Duration) {}

    fn setup(&self, setup: &EngineSetup) -> Result<(), EngineError> {
        if setup.working_path == "/nonexistent" {
            return Err(EngineError::msg("working path does not exist"));
        }
        self.0.setups.lock().push(setup.clone());
        Ok(())
    }
}

impl EngineInstance for FakeInstance {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.0.fail_start.load(Ordering::SeqCst) {
            return Err(EngineError::msg("bind: address already in use"));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn url_test(&mut self, tag: &str) -> Result<Vec<Probe>, EngineError> {
        if tag != "direct" {
            return Err(EngineError::msg(format!("unknown outbound {tag:?}")));
        }
        Ok(vec![Probe {
            tag: tag.to_string(),
            delay: Some(Duration::from_millis(7)),
        }])
    }
}

impl Drop for FakeInstance {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn controller() -> (Arc<SessionController<FakeEngine>>, Arc<Shared>) {
    let engine = FakeEngine::default();
    let shared = engine.0.clone();
    (Arc::new(SessionController::new(engine)), shared)
}
