use anyhow::Result;
use relation::{serve, CoreService, Settings};
use rl_core::SessionController;
use rl_types::SessionError;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};

/// Serve until stdin closes or Ctrl+C, then stop a running engine.
pub async fn run(settings: &Settings) -> Result<()> {
    let controller = Arc::new(SessionController::new(settings.process_engine()));
    let service = Arc::new(CoreService::new(controller.clone()));
    info!("serving JSON lines on stdio");

    tokio::select! {
        served = serve::serve(service, BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => served?,
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    let stopped = tokio::task::spawn_blocking(move || controller.stop()).await?;
    match stopped {
        Ok(()) => info!("engine stopped on exit"),
        Err(SessionError::NotRunning) => {}
        Err(e) => warn!(error = %e, "engine did not stop cleanly"),
    }
    Ok(())
}
