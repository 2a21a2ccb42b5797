//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! Reads `CommandEnvelope` messages as newline-delimited JSON from stdin
//! and writes `ResponseEnvelope` messages to stdout. A queue worker runs
//! alongside so queue-driven jobs advance on their own.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use thesis_scout::App;
use thesis_scout::host::run_stdio_bridge;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("scout-host starting");

    let app = App::load().map_err(|e| anyhow::anyhow!("scout-host startup failed: {e}"))?;

    let cancel = CancellationToken::new();
    let worker = app.worker();
    let worker_cancel = cancel.clone();
    let worker_handle = tokio::spawn(async move { worker.run(worker_cancel).await });

    let bridge_result = run_stdio_bridge(app.host_handler()).await;

    cancel.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "queue worker task failed");
    }

    bridge_result.map_err(|e| {
        tracing::error!(error = %e, "scout-host exited with error");
        anyhow::anyhow!("scout-host failed: {e}")
    })?;

    tracing::info!("scout-host shut down cleanly");
    Ok(())
}
