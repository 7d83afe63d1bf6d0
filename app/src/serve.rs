//! JSON-lines transport for [`CoreService`]: one request per input line,
//! one envelope per output line. Blank lines are skipped.

use crate::service::CoreService;
use anyhow::Result;
use rl_core::EngineAdapter;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

/// Serve until `reader` reaches end of input. Requests are handled one at a
/// time, off the async workers.
pub async fn serve<A, R, W>(service: Arc<CoreService<A>>, reader: R, mut writer: W) -> Result<()>
where
    A: EngineAdapter + 'static,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0u64;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let svc = service.clone();
        let response = tokio::task::spawn_blocking(move || svc.handle_line(&line)).await?;
        writer.write_all(response.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        handled += 1;
    }
    info!(handled, "request stream closed");
    Ok(())
}
