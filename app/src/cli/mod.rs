pub mod check;
pub mod parse;
pub mod run;
pub mod serve;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relation::{EngineArgs, Settings};
use rl_config::{ConfigChecker, RawInput, StructuralChecker};
use std::io::Read;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "relation", version)]
#[command(about = "Resolve proxy configs and drive a sing-box engine", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve input into a canonical engine config
    Parse(parse::ParseArgs),
    /// Resolve and validate a config file, report the outcome
    Check(check::CheckArgs),
    /// Run the engine on a config until interrupted
    Run(run::RunArgs),
    /// Serve the envelope API as JSON lines on stdin/stdout
    Serve,
}

/// The engine binary checks configs unless `offline`, where the built-in
/// structural checker is used instead.
pub fn checker(settings: &Settings, offline: bool) -> Box<dyn ConfigChecker> {
    if offline {
        Box::new(StructuralChecker::new())
    } else {
        Box::new(settings.process_engine())
    }
}

/// `content` wins over `file`; a file of `-` reads stdin.
pub fn read_input(content: Option<String>, file: Option<&Path>) -> Result<RawInput> {
    match (content, file) {
        (Some(content), _) => Ok(RawInput::inline(content)),
        (None, Some(path)) if path == Path::new("-") => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("read config from stdin")?;
            Ok(RawInput::inline(text))
        }
        (None, Some(path)) => Ok(RawInput::path(path)),
        (None, None) => Ok(RawInput::default()),
    }
}
