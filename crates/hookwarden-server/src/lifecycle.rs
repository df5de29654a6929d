//! Server lifecycle: serve, drain, clean, exit.

use crate::shutdown::ShutdownCoordinator;
use axum::Router;
use hookwarden_git::RepoCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How shutdown went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every in-flight request finished inside the grace period.
    pub drained: bool,
    /// The repository cache was removed.
    pub cleaned: bool,
}

/// Runs the server until shutdown and then tears down in a fixed order.
///
/// 1. serve until the coordinator is cancelled
/// 2. stop accepting and wait up to the grace period for in-flight requests
/// 3. stop background tasks
/// 4. clean the repository cache
/// 5. mark the coordinator complete
pub struct Lifecycle {
    coordinator: ShutdownCoordinator,
    repos: Arc<RepoCache>,
    background: Vec<JoinHandle<()>>,
}

impl Lifecycle {
    pub fn new(coordinator: ShutdownCoordinator, repos: Arc<RepoCache>) -> Self {
        Self {
            coordinator,
            repos,
            background: Vec::new(),
        }
    }

    /// A task aborted once requests have drained (refresh loops, watchers).
    pub fn with_background(mut self, task: JoinHandle<()>) -> Self {
        self.background.push(task);
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.coordinator.timeout()
    }

    /// Serve `router` on `listener` until shutdown, then drain and clean.
    ///
    /// Cleanup runs even when the server fails; the server error is returned
    /// afterwards.
    pub async fn run(self, listener: TcpListener, router: Router) -> Result<ShutdownReport, std::io::Error> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "Server listening");
        }

        let stop = self.coordinator.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await
        });
        tokio::pin!(server);

        let mut server_error = None;
        let drained = tokio::select! {
            result = &mut server => {
                // Stopped without being asked to.
                server_error = flatten(result).err();
                self.coordinator.initiate();
                true
            }
            _ = self.coordinator.cancelled() => {
                let grace = self.grace_period();
                info!(grace_ms = grace.as_millis() as u64, "Draining in-flight requests");
                match tokio::time::timeout(grace, &mut server).await {
                    Ok(result) => {
                        server_error = flatten(result).err();
                        true
                    }
                    Err(_) => {
                        warn!("Grace period elapsed, abandoning in-flight requests");
                        server.abort();
                        false
                    }
                }
            }
        };

        for task in &self.background {
            task.abort();
        }

        let cleaned = match self.repos.clean().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to clean repository cache");
                false
            }
        };

        self.coordinator.complete();

        match server_error {
            Some(e) => Err(e),
            None => Ok(ShutdownReport { drained, cleaned }),
        }
    }
}

fn flatten(result: Result<std::io::Result<()>, tokio::task::JoinError>) -> std::io::Result<()> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
    }
}
