//! Engine settings: environment first, command-line flags on top.

use clap::Args;
use rl_core::{ProcessEngine, ProcessSettings};
use std::path::PathBuf;

pub const ENV_ENGINE_BIN: &str = "RL_ENGINE_BIN";
pub const ENV_WORKING_DIR: &str = "RL_WORKING_DIR";
pub const ENV_TEMP_DIR: &str = "RL_TEMP_DIR";
pub const ENV_MEMORY_LIMIT: &str = "RL_MEMORY_LIMIT";

/// Engine flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// sing-box compatible binary (env: RL_ENGINE_BIN)
    #[arg(long, global = true, value_name = "PATH")]
    pub engine_bin: Option<PathBuf>,

    /// Engine working directory (env: RL_WORKING_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Directory for generated config files (env: RL_TEMP_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// GOMEMLIMIT value applied when the memory limit is on (env: RL_MEMORY_LIMIT)
    #[arg(long, global = true, value_name = "SIZE")]
    pub memory_limit_value: Option<String>,

    /// Debug logging, and pass engine output through
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub engine: ProcessSettings,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut engine = ProcessSettings::default();
        if let Some(v) = get(ENV_ENGINE_BIN) {
            engine.binary = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_WORKING_DIR) {
            engine.working_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_TEMP_DIR) {
            engine.temp_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_MEMORY_LIMIT) {
            engine.memory_limit = v;
        }
        Self { engine }
    }

    pub fn with_args(mut self, args: &EngineArgs) -> Self {
        if let Some(bin) = &args.engine_bin {
            self.engine.binary = bin.clone();
        }
        if let Some(dir) = &args.working_dir {
            self.engine.working_dir = dir.clone();
        }
        if let Some(dir) = &args.temp_dir {
            self.engine.temp_dir = dir.clone();
        }
        if let Some(limit) = &args.memory_limit_value {
            self.engine.memory_limit = limit.clone();
        }
        if args.debug {
            self.engine.debug = true;
        }
        self
    }

    pub fn process_engine(&self) -> ProcessEngine {
        ProcessEngine::new(self.engine.clone())
    }
}
