//! relation: resolve proxy configs and drive a sing-box engine session.

mod cli;

use clap::Parser;
use relation::{logging, panic, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    logging::init_logging(args.engine.debug)?;
    panic::install();

    let settings = Settings::from_env().with_args(&args.engine);
    tracing::debug!(?settings, "settings resolved");

    match args.command {
        cli::Commands::Parse(a) => cli::parse::run(a, &settings),
        cli::Commands::Check(a) => {
            let code = cli::check::run(a, &settings)?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        cli::Commands::Run(a) => cli::run::run(a, &settings).await,
        cli::Commands::Serve => cli::serve::run(&settings).await,
    }
}
