use crate::repository::refresh_token_repository::RefreshTokenRepositoryTrait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Digest stored in place of the raw refresh token (SHA-256, lowercase hex).
pub fn hash_refresh_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{:x}", digest)
}

/// Periodically delete expired refresh tokens until `shutdown_token` fires.
pub fn start_cleanup_task(
    repository: Arc<dyn RefreshTokenRepositoryTrait>,
    interval_minutes: u64,
    shutdown_token: CancellationToken,
) -> JoinHandle<()> {
    let interval_duration = std::time::Duration::from_secs(interval_minutes.max(1) * 60);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval_duration);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match repository.delete_expired(Utc::now()).await {
                        Ok(purged) => {
                            if purged > 0 {
                                tracing::info!("SECURITY: Purged {} expired refresh tokens", purged);
                            }
                        }
                        Err(e) => {
                            tracing::error!("Error during refresh token cleanup: {}", e);
                        }
                    }
                }
                _ = shutdown_token.cancelled() => {
                    tracing::info!("Refresh token cleanup task received shutdown signal, stopping gracefully");
                    break;
                }
            }
        }

        tracing::info!("Refresh token cleanup task stopped");
    })
}
