use tokio_util::sync::CancellationToken;

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::error;

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => (),
                _ = terminate.recv() => (),
            }
        }
        Err(e) => {
            error!("Failed to install a SIGTERM handler {e:?}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Detects signals sent to the process and cancels the daemon so the ledger can run
/// its final save. SIGTERM is what `daytally stop` sends on unix.
///
/// On Windows detached processes can't detect signals sent to them, so a stopped
/// daemon there is only as fresh as its latest heartbeat write.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    wait_for_signal().await;
    cancelation.cancel();
}
