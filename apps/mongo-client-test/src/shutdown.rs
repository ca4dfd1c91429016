//! Process shutdown on SIGINT / SIGTERM / SIGHUP.

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// Wait for one unix signal. A handler that cannot be installed is logged
/// and never fires.
#[cfg(unix)]
async fn unix_signal(kind: signal::unix::SignalKind, name: &str) {
    match signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install {name} handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Completes on Ctrl+C (SIGINT), SIGTERM or SIGHUP.
///
/// A handler that cannot be installed is logged and never fires; the
/// others still work.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = unix_signal(signal::unix::SignalKind::terminate(), "SIGTERM");
    #[cfg(unix)]
    let hangup = unix_signal(signal::unix::SignalKind::hangup(), "SIGHUP");

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
        _ = hangup => {
            info!("Received SIGHUP, initiating graceful shutdown");
        },
    }
}

/// Flip a watch channel to `true` once a signal arrives.
///
/// Subscribers check the flag between cycles or await [`wait_for_shutdown`].
pub fn listen_for_signals() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = tx.send(true);
    });
    rx
}

/// Completes once the flag is set or every sender is gone
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
