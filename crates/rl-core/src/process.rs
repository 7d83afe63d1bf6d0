//! Process engine: runs an external sing-box compatible binary.
//!
//! - `check`: `<bin> check -c <file>`
//! - `start`: `<bin> run -c <file> -D <working_dir>`
//!
//! Each instance owns its config file (removed on close) and its child
//! process (killed on close or drop).

use crate::engine::{EngineAdapter, EngineInstance, EngineSetup, Probe};
use parking_lot::RwLock;
use rl_config::{CanonicalConfig, ConfigChecker};
use rl_types::{CheckError, EngineError};
use serde_json::Value;
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use std::{env, fs};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info, warn};

pub const DEFAULT_BINARY: &str = "sing-box";
pub const DEFAULT_MEMORY_LIMIT: &str = "45MiB";

/// A child that exits this soon after spawn failed to start.
const STARTUP_GRACE: Duration = Duration::from_millis(300);
const STARTUP_POLL: Duration = Duration::from_millis(25);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSettings {
    pub binary: PathBuf,
    pub working_dir: PathBuf,
    pub temp_dir: PathBuf,
    /// Value for `GOMEMLIMIT` when the memory-limit policy is on.
    pub memory_limit: String,
    /// Inherit the child's stdout/stderr instead of discarding them.
    pub debug: bool,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            working_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            temp_dir: env::temp_dir(),
            memory_limit: DEFAULT_MEMORY_LIMIT.to_string(),
            debug: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct ProcessEngine {
    settings: RwLock<ProcessSettings>,
    limit_memory: AtomicBool,
}

impl ProcessEngine {
    pub fn new(settings: ProcessSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            limit_memory: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> ProcessSettings {
        self.settings.read().clone()
    }

    pub fn memory_limited(&self) -> bool {
        self.limit_memory.load(Ordering::SeqCst)
    }
}

fn write_temp(dir: &Path, prefix: &str, content: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".json")
        .tempfile_in(dir)?;
    file.write_all(content)?;
    file.flush()?;
    Ok(file)
}

impl ConfigChecker for ProcessEngine {
    fn check(&self, content: &[u8]) -> Result<(), CheckError> {
        let settings = self.settings();
        let file = write_temp(&settings.temp_dir, "relation-check-", content)
            .map_err(|e| CheckError::new(format!("write temp config: {e}")))?;

        let output = Command::new(&settings.binary)
            .arg("check")
            .arg("-c")
            .arg(file.path())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CheckError::new(format!("run {}: {e}", settings.binary.display())))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            Err(CheckError::new(format!("engine check failed: {}", output.status)))
        } else {
            Err(CheckError::new(stderr))
        }
    }
}

impl EngineAdapter for ProcessEngine {
    fn new_instance(&self, config: &CanonicalConfig) -> Result<Box<dyn EngineInstance>, EngineError> {
        let settings = self.settings();
        let config_path = write_temp(&settings.temp_dir, "relation-run-", config.as_bytes())
            .map_err(|e| EngineError::io("write engine config", e))?
            .into_temp_path();
        debug!(path = %config_path.display(), "engine config persisted");
        Ok(Box::new(ProcessInstance {
            settings,
            limit_memory: self.memory_limited(),
            config_path: Some(config_path),
            document: config.value().clone(),
            child: None,
        }))
    }

    fn set_memory_limit(&self, enabled: bool) {
        self.limit_memory.store(enabled, Ordering::SeqCst);
    }

    fn setup(&self, setup: &EngineSetup) -> Result<(), EngineError> {
        let mut settings = self.settings.write();
        if !setup.working_path.is_empty() {
            let dir = PathBuf::from(&setup.working_path);
            fs::create_dir_all(&dir).map_err(|e| EngineError::io("create working directory", e))?;
            settings.working_dir = dir;
        }
        if !setup.temp_path.is_empty() {
            let dir = PathBuf::from(&setup.temp_path);
            fs::create_dir_all(&dir).map_err(|e| EngineError::io("create temp directory", e))?;
            settings.temp_dir = dir;
        }
        if !setup.base_path.is_empty() {
            let candidate = Path::new(&setup.base_path).join(&settings.binary);
            if candidate.is_file() {
                settings.binary = candidate;
            }
        }
        if setup.status_port != 0 {
            debug!(port = setup.status_port, "status port is not used by the process engine");
        }
        settings.debug = setup.debug;
        Ok(())
    }
}

struct ProcessInstance {
    settings: ProcessSettings,
    limit_memory: bool,
    config_path: Option<TempPath>,
    document: Value,
    child: Option<Child>,
}

impl ProcessInstance {
    fn outbound(&self, tag: &str) -> Option<&Value> {
        self.document
            .get("outbounds")?
            .as_array()?
            .iter()
            .find(|o| o.get("tag").and_then(Value::as_str) == Some(tag))
    }

    fn reap(&mut self) -> Result<(), EngineError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if let Ok(Some(status)) = child.try_wait() {
            warn!(%status, "engine process had already exited");
            return Ok(());
        }
        child.kill().map_err(|e| EngineError::io("kill engine process", e))?;
        child.wait().map_err(|e| EngineError::io("wait for engine process", e))?;
        Ok(())
    }
}

impl EngineInstance for ProcessInstance {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.child.is_some() {
            return Err(EngineError::msg("engine process already started"));
        }
        let path = self
            .config_path
            .as_deref()
            .ok_or_else(|| EngineError::msg("engine config was already released"))?;

        let mut cmd = Command::new(&self.settings.binary);
        cmd.arg("run")
            .arg("-c")
            .arg(path)
            .arg("-D")
            .arg(&self.settings.working_dir)
            .stdin(Stdio::null());
        if self.limit_memory {
            cmd.env("GOMEMLIMIT", &self.settings.memory_limit);
        }
        if self.settings.debug {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::io(format!("spawn {}", self.settings.binary.display()), e))?;

        let deadline = Instant::now() + STARTUP_GRACE;
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Err(EngineError::msg(format!("engine exited during startup: {status}")));
                }
                Ok(None) => thread::sleep(STARTUP_POLL),
                Err(e) => {
                    kill_and_reap(&mut child);
                    return Err(EngineError::io("poll engine process", e));
                }
            }
        }

        info!(pid = child.id(), limit_memory = self.limit_memory, "engine process running");
        self.child = Some(child);
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        let reaped = self.reap();
        if let Some(path) = self.config_path.take() {
            if let Err(e) = path.close() {
                warn!(error = %e, "failed to remove engine config");
            }
        }
        reaped
    }

    fn url_test(&mut self, tag: &str) -> Result<Vec<Probe>, EngineError> {
        let outbound = self
            .outbound(tag)
            .ok_or_else(|| EngineError::msg(format!("unknown outbound {tag:?}")))?;

        let targets: Vec<&Value> = match outbound.get("type").and_then(Value::as_str) {
            Some("selector" | "urltest") => outbound
                .get("outbounds")
                .and_then(Value::as_array)
                .map(|members| {
                    members
                        .iter()
                        .filter_map(Value::as_str)
                        .filter_map(|m| self.outbound(m))
                        .collect()
                })
                .unwrap_or_default(),
            _ => vec![outbound],
        };

        let probes: Vec<Probe> = targets.into_iter().filter_map(probe).collect();
        if probes.is_empty() {
            return Err(EngineError::msg(format!("{tag:?} has no dialable outbound")));
        }
        if probes.iter().all(|p| p.delay.is_none()) {
            return Err(EngineError::msg(format!("no outbound of {tag:?} is reachable")));
        }
        Ok(probes)
    }
}

impl Drop for ProcessInstance {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.reap() {
                warn!(error = %e, "failed to reap engine process on drop");
            }
        }
    }
}

/// Kill `child` and wait for it. Failures are only logged.
fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(error = %e, "failed to kill engine process");
    }
    if let Err(e) = child.wait() {
        warn!(error = %e, "failed to wait for engine process");
    }
}

/// TCP connect to the outbound's server. `None` for outbounds that do not
/// dial a server.
fn probe(outbound: &Value) -> Option<Probe> {
    let tag = outbound.get("tag").and_then(Value::as_str)?.to_string();
    let server = outbound.get("server").and_then(Value::as_str)?;
    let port = outbound
        .get("server_port")
        .and_then(Value::as_u64)
        .and_then(|p| u16::try_from(p).ok())?;

    let started = Instant::now();
    let reachable = (server, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .is_some_and(|addr| TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok());
    let delay = reachable.then(|| started.elapsed());
    debug!(%tag, server, port, ?delay, "probe finished");
    Some(Probe { tag, delay })
}
