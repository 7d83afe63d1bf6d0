use anyhow::Result;
use clap::Args;
use relation::Settings;
use rl_types::Provenance;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Config file path ('-' for stdin)
    #[arg(short = 'f', long)]
    pub file: PathBuf,

    /// Validate with the built-in structural checker, not the engine
    #[arg(long)]
    pub offline: bool,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    provenance: Option<Provenance>,
    outbounds: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Returns the exit code: 0 when the config resolves, 2 otherwise.
pub fn run(args: CheckArgs, settings: &Settings) -> Result<i32> {
    let raw = super::read_input(None, Some(&args.file))?;
    let checker = super::checker(settings, args.offline);

    let report = match rl_config::resolve(&raw, &*checker) {
        Ok(config) => CheckReport {
            ok: true,
            provenance: Some(config.provenance()),
            outbounds: config.outbound_tags().len(),
            error: None,
        },
        Err(e) => CheckReport {
            ok: false,
            provenance: e.provenance(),
            outbounds: 0,
            error: Some(e.to_string()),
        },
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(error) = &report.error {
        eprintln!("error: {error}");
    } else if let Some(provenance) = report.provenance {
        println!("ok: {provenance} config, {} outbounds", report.outbounds);
    }

    Ok(if report.ok { 0 } else { 2 })
}
