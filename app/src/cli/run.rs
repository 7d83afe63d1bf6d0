use anyhow::{Context, Result};
use clap::Args;
use relation::Settings;
use rl_config::RawInput;
use rl_core::{ProcessEngine, SessionController};
use rl_types::SessionError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config file path
    #[arg(short = 'f', long)]
    pub file: PathBuf,

    /// Run the engine under its memory limit
    #[arg(long)]
    pub memory_limit: bool,
}

enum RunSignal {
    Terminate,
    Reload,
}

/// Start the engine, then wait for a signal. SIGHUP re-reads the file and
/// restarts; Ctrl+C or SIGTERM stops and returns.
pub async fn run(args: RunArgs, settings: &Settings) -> Result<()> {
    let controller = Arc::new(SessionController::new(settings.process_engine()));
    let raw = RawInput::path(&args.file);

    blocking(&controller, {
        let raw = raw.clone();
        move |ctl| ctl.start(&raw, args.memory_limit)
    })
    .await?
    .with_context(|| format!("start engine with {}", args.file.display()))?;
    info!(file = %args.file.display(), "engine running");

    loop {
        match wait_for_signal().await {
            RunSignal::Reload => {
                info!("reload requested");
                let raw = raw.clone();
                if let Err(e) = blocking(&controller, move |ctl| ctl.restart(&raw, args.memory_limit)).await? {
                    warn!(error = %e, "restart failed");
                    if !controller.is_running() {
                        return Err(e).context("restart engine");
                    }
                }
            }
            RunSignal::Terminate => break,
        }
    }

    info!("shutting down");
    match blocking(&controller, |ctl| ctl.stop()).await? {
        Ok(()) | Err(SessionError::NotRunning) => Ok(()),
        Err(e) => Err(e).context("stop engine"),
    }
}

/// Controller calls block on the engine process; keep them off the workers.
async fn blocking<F>(
    controller: &Arc<SessionController<ProcessEngine>>,
    op: F,
) -> Result<Result<(), SessionError>>
where
    F: FnOnce(&SessionController<ProcessEngine>) -> Result<(), SessionError> + Send + 'static,
{
    let ctl = controller.clone();
    Ok(tokio::task::spawn_blocking(move || op(&ctl)).await?)
}

async fn wait_for_signal() -> RunSignal {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => RunSignal::Terminate,
        () = term_signal() => RunSignal::Terminate,
        () = hup_signal() => RunSignal::Reload,
    }
}

#[cfg(unix)]
async fn term_signal() {
    unix_signal(tokio::signal::unix::SignalKind::terminate()).await;
}

#[cfg(unix)]
async fn hup_signal() {
    unix_signal(tokio::signal::unix::SignalKind::hangup()).await;
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "signal handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn term_signal() {
    std::future::pending::<()>().await;
}

#[cfg(not(unix))]
async fn hup_signal() {
    std::future::pending::<()>().await;
}
