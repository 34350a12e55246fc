//! Background maintenance: expired nonces and expired previous key pairs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::keys::KeyManager;
use crate::nonce::NonceStore;

/// Periodically purge expired nonces until the returned handle is aborted.
///
/// Must be called from within a tokio runtime.
pub fn spawn_nonce_sweeper(store: Arc<dyn NonceStore>, every: Duration) -> JoinHandle<()> {
    spawn_purge_loop("nonces", every, move || {
        store.purge_expired().map_err(|e| e.to_string())
    })
}

/// Periodically drop previous key pairs whose grace period has elapsed.
///
/// Must be called from within a tokio runtime.
pub fn spawn_key_purger(keys: Arc<KeyManager>, every: Duration) -> JoinHandle<()> {
    spawn_purge_loop("previous_keys", every, move || {
        keys.purge_all_expired().map_err(|e| e.to_string())
    })
}

/// Purges run on the blocking pool since the SQLite and file backends do
/// synchronous I/O.
fn spawn_purge_loop<F>(what: &'static str, every: Duration, purge: F) -> JoinHandle<()>
where
    F: Fn() -> Result<usize, String> + Send + Sync + 'static,
{
    let purge = Arc::new(purge);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purge = purge.clone();
            match tokio::task::spawn_blocking(move || (*purge)()).await {
                Ok(Ok(0)) => {}
                Ok(Ok(purged)) => tracing::debug!(what, purged, "purged expired entries"),
                Ok(Err(e)) => tracing::error!(what, error = %e, "purge failed"),
                Err(e) => tracing::error!(what, error = %e, "purge task panicked"),
            }
        }
    })
}
