//! Expired-session housekeeping.

use std::time::Duration;

use tokio::task::JoinHandle;
use tower_sessions::ExpiredDeletion;
use tracing::{debug, warn};

use crate::StorageError;

/// Delete every expired session record once.
pub async fn prune_expired_sessions<S>(store: &S) -> Result<(), StorageError>
where
    S: ExpiredDeletion,
{
    store.delete_expired().await?;
    Ok(())
}

/// Spawn a background task that deletes expired sessions every `period`.
///
/// Failures are logged and the task keeps running; abort the returned
/// handle to stop it.
pub fn spawn_expired_session_pruner<S>(store: S, period: Duration) -> JoinHandle<()>
where
    S: ExpiredDeletion,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match prune_expired_sessions(&store).await {
                Ok(()) => debug!("Pruned expired sessions"),
                Err(e) => warn!("Failed to prune expired sessions: {e}"),
            }
        }
    })
}
