//! OS signal handling.

use super::ShutdownCoordinator;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Resolve on SIGINT or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires; the other
/// one still works.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

/// Initiate shutdown on the first SIGINT or SIGTERM.
pub fn install_signal_handlers(coordinator: ShutdownCoordinator) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        coordinator.initiate();
    })
}
