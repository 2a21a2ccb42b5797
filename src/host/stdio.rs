//! Newline-delimited JSON bridge for the host command channel.
//!
//! Reads one `CommandEnvelope` per line and writes one `ResponseEnvelope`
//! per line. Commands run concurrently, so responses may come back out of
//! order; callers match them by `request_id`.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::error::{Result, ScoutError};
use crate::error::error_codes::INVALID_INPUT;
use crate::host::contract::{CommandEnvelope, ResponseEnvelope};
use crate::host::handler::HostHandler;

type SharedWriter<W> = Arc<Mutex<BufWriter<W>>>;

/// Serve stdin/stdout until stdin closes.
pub async fn run_stdio_bridge(handler: Arc<HostHandler>) -> Result<()> {
    run_bridge(handler, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve `reader` → `writer` until EOF, then wait for in-flight commands.
pub async fn run_bridge<R, W>(handler: Arc<HostHandler>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer: SharedWriter<W> = Arc::new(Mutex::new(BufWriter::new(writer)));
    let mut reader = BufReader::new(reader);
    let mut in_flight = JoinSet::new();
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| ScoutError::Io(format!("failed to read command stream: {e}")))?;
        if bytes_read == 0 {
            tracing::info!("command stream closed (EOF); draining in-flight commands");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse command envelope");
                let response = ResponseEnvelope::error(
                    "parse-error",
                    INVALID_INPUT,
                    format!("failed to parse command envelope: {e}"),
                );
                write_response(&writer, &response).await?;
                continue;
            }
        };

        let handler = Arc::clone(&handler);
        let writer = Arc::clone(&writer);
        in_flight.spawn(async move {
            let response = handler.handle(envelope).await;
            if let Err(e) = write_response(&writer, &response).await {
                tracing::warn!(
                    error = %e,
                    request_id = %response.request_id,
                    "failed to write response"
                );
            }
        });
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "command task panicked");
        }
    }
    Ok(())
}

/// Write a single JSON line and flush.
async fn write_response<W: AsyncWrite + Unpin>(
    writer: &SharedWriter<W>,
    response: &ResponseEnvelope,
) -> Result<()> {
    let json = serde_json::to_string(response)?;
    let mut w = writer.lock().await;
    w.write_all(json.as_bytes())
        .await
        .map_err(|e| ScoutError::Io(format!("failed to write response: {e}")))?;
    w.write_all(b"\n")
        .await
        .map_err(|e| ScoutError::Io(format!("failed to write newline: {e}")))?;
    w.flush()
        .await
        .map_err(|e| ScoutError::Io(format!("failed to flush response: {e}")))?;
    Ok(())
}
