use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Create a `CancellationToken` and spawn a task that cancels it on
/// SIGINT or SIGTERM.
///
/// The SIGTERM handler is installed before returning so that a failure
/// surfaces at startup rather than as a daemon that cannot be stopped.
pub fn create_shutdown_token() -> std::io::Result<CancellationToken> {
    let token = CancellationToken::new();

    #[cfg(unix)]
    let terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    let token_clone = token.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        shutdown_signal(terminate).await;
        #[cfg(not(unix))]
        shutdown_signal().await;
        token_clone.cancel();
    });

    Ok(token)
}

/// Wait for the first of SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal(mut terminate: signal::unix::Signal) {
    tokio::select! {
        () = ctrl_c() => info!(signal = "SIGINT", "shutdown requested"),
        _ = terminate.recv() => info!(signal = "SIGTERM", "shutdown requested"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c().await;
    info!(signal = "SIGINT", "shutdown requested");
}

/// Resolve on Ctrl+C. If the handler cannot be installed, never resolve.
async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
