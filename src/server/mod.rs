//! Router assembly and replica lifecycle for both services.

pub mod auth;
pub mod inventory;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

pub use auth::{AuthReplica, AuthState};
pub use inventory::{InventoryReplica, InventoryState};

fn cors_layer(enabled: bool) -> Option<CorsLayer> {
    enabled.then(CorsLayer::permissive)
}

/// Resolves when `cancel` fires; used as the graceful-shutdown signal.
async fn shutdown(cancel: CancellationToken) {
    cancel.cancelled().await;
    tracing::info!("Shutdown requested, draining connections");
}

/// Waits for a background task after shutdown. Returns false if it panicked
/// or was aborted.
async fn join_background(handle: JoinHandle<()>, name: &str) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(task = name, error = %e, "Background task did not finish cleanly");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_panic_is_reported() {
        let panicked = tokio::spawn(async {
            panic!("bootstrap exploded");
        });
        assert!(!join_background(panicked, "test task").await);

        let finished = tokio::spawn(async {});
        assert!(join_background(finished, "test task").await);
    }
}
