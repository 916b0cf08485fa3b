// EN: src/system/signals.rs

/// Resolves once the supervisor itself is asked to stop.
///
/// Listens for Ctrl+C everywhere, plus `SIGTERM` and `SIGHUP` on Unix (the latter is
/// what a desktop session sends when it closes the terminal or logs out).
pub async fn stop_requested() {
    let reason = wait_for_signal().await;
    log::warn!("Received {}, shutting down", reason);
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut terminate, mut hangup) =
        match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
            (Ok(terminate), Ok(hangup)) => (terminate, hangup),
            (Err(e), _) | (_, Err(e)) => {
                log::warn!("Could not listen for termination signals: {}", e);
                return ctrl_c().await;
            }
        };

    tokio::select! {
        reason = ctrl_c() => reason,
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl+C",
        Err(e) => {
            log::warn!("Could not listen for Ctrl+C: {}", e);
            std::future::pending().await
        }
    }
}
