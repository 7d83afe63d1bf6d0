use anyhow::{Context, Result};
use clap::Args;
use relation::Settings;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Config text: native JSON, share links, or a proxy-list YAML
    #[arg(long, conflicts_with = "file")]
    pub content: Option<String>,

    /// Read the config from a file ('-' for stdin)
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Write the canonical config here instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Validate with the built-in structural checker, not the engine
    #[arg(long)]
    pub offline: bool,
}

pub fn run(args: ParseArgs, settings: &Settings) -> Result<()> {
    let raw = super::read_input(args.content, args.file.as_deref())?;
    let checker = super::checker(settings, args.offline);

    match args.output {
        Some(target) => {
            let config = rl_config::write_canonical(&raw, &*checker, &target)
                .with_context(|| format!("parse into {}", target.display()))?;
            info!(
                provenance = %config.provenance(),
                path = %target.display(),
                "canonical config written"
            );
        }
        None => {
            let config = rl_config::resolve(&raw, &*checker).context("parse")?;
            println!("{}", config.as_str());
        }
    }
    Ok(())
}
