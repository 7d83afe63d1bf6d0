//! Session controller: the single owner of the running engine instance.
//!
//! Every lifecycle operation takes the same lock for its whole duration and
//! runs inside a fault boundary, so a panic in an adapter surfaces as
//! [`SessionError::Fault`] and the controller stays usable.

use crate::engine::{EngineAdapter, EngineInstance, EngineSetup, Probe};
use parking_lot::{Mutex, MutexGuard};
use rl_config::{CanonicalConfig, ConfigError, FormatResolver, RawInput};
use rl_types::{boundary, SessionError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause between the stop and start halves of a restart.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

type Slot = Option<Box<dyn EngineInstance>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Stopped,
    Running,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
        })
    }
}

/// Owns at most one engine instance.
pub struct SessionController<A: EngineAdapter> {
    adapter: Arc<A>,
    slot: Mutex<Slot>,
    settle_delay: Duration,
}

impl<A: EngineAdapter> SessionController<A> {
    pub fn new(adapter: A) -> Self {
        Self::with_adapter(Arc::new(adapter))
    }

    pub fn with_adapter(adapter: Arc<A>) -> Self {
        Self {
            adapter,
            slot: Mutex::new(None),
            settle_delay: SETTLE_DELAY,
        }
    }

    /// Override the restart settle delay handed to [`EngineAdapter::settle`].
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    pub fn state(&self) -> SessionState {
        if self.slot.lock().is_some() {
            SessionState::Running
        } else {
            SessionState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Resolve `raw` with the adapter as checker. Does not take the
    /// lifecycle lock.
    pub fn resolve(&self, raw: &RawInput) -> Result<CanonicalConfig, ConfigError> {
        FormatResolver::new(&*self.adapter).resolve(raw)
    }

    /// Start an instance from `raw`, stopping the current one first.
    pub fn start(&self, raw: &RawInput, memory_limit: bool) -> Result<(), SessionError> {
        boundary("start", || {
            let mut slot = self.slot.lock();
            self.start_locked(&mut slot, raw, memory_limit)
        })
    }

    /// Stop the current instance. `NotRunning` when there is none.
    pub fn stop(&self) -> Result<(), SessionError> {
        boundary("stop", || {
            let mut slot = self.slot.lock();
            self.stop_locked(&mut slot)
        })
    }

    /// Stop the current instance, settle, and start a new one from `raw`.
    pub fn restart(&self, raw: &RawInput, memory_limit: bool) -> Result<(), SessionError> {
        boundary("restart", || {
            let mut slot = self.slot.lock();
            if slot.is_none() {
                return Err(SessionError::InstanceNotFound);
            }
            self.stop_locked(&mut slot)?;
            debug!(delay_ms = self.settle_delay.as_millis() as u64, "settling before restart");
            self.adapter.settle(self.settle_delay);
            self.start_locked(&mut slot, raw, memory_limit)
        })
    }

    /// Forward engine setup to the adapter.
    pub fn setup(&self, setup: &EngineSetup) -> Result<(), SessionError> {
        boundary("setup", || {
            let _slot = self.slot.lock();
            self.adapter.setup(setup).map_err(SessionError::Setup)?;
            info!(working_path = %setup.working_path, debug = setup.debug, "engine setup applied");
            Ok(())
        })
    }

    /// Probe outbound `tag` of the running instance.
    pub fn url_test(&self, tag: &str) -> Result<Vec<Probe>, SessionError> {
        boundary("url_test", || {
            let mut slot = self.slot.lock();
            let instance = slot.as_mut().ok_or(SessionError::NotRunning)?;
            instance.url_test(tag).map_err(SessionError::UrlTest)
        })
    }

    fn start_locked(
        &self,
        slot: &mut MutexGuard<'_, Slot>,
        raw: &RawInput,
        memory_limit: bool,
    ) -> Result<(), SessionError> {
        if slot.is_some() {
            info!("engine already running; stopping it before start");
            self.stop_locked(slot)?;
        }

        self.adapter.set_memory_limit(memory_limit);
        let config = self.resolve(raw)?;

        let mut instance = self
            .adapter
            .new_instance(&config)
            .map_err(SessionError::Construction)?;
        if let Err(e) = instance.start() {
            if let Err(close_err) = instance.close() {
                debug!(error = %close_err, "close after failed start");
            }
            return Err(SessionError::Start(e));
        }

        **slot = Some(instance);
        info!(
            provenance = %config.provenance(),
            memory_limit,
            "engine started"
        );
        Ok(())
    }

    fn stop_locked(&self, slot: &mut MutexGuard<'_, Slot>) -> Result<(), SessionError> {
        let Some(mut instance) = slot.take() else {
            return Err(SessionError::NotRunning);
        };
        let closed = instance.close();
        drop(instance);
        self.adapter.reclaim_memory();

        match closed {
            Ok(()) => {
                info!("engine stopped");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "engine close failed; instance released anyway");
                Err(SessionError::Close(e))
            }
        }
    }
}

impl<A: EngineAdapter> Drop for SessionController<A> {
    fn drop(&mut self) {
        if let Some(mut instance) = self.slot.get_mut().take() {
            match instance.close() {
                Ok(()) => info!("engine stopped on controller drop"),
                Err(e) => warn!(error = %e, "engine close failed on controller drop"),
            }
        }
    }
}

impl<A: EngineAdapter> fmt::Debug for SessionController<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}
