//! Expiry Sweep Task
//!
//! Background task that periodically drops expired entries from both
//! cache stores.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheFacade;

/// Spawns a background task that purges expired entries every
/// `cleanup_interval_secs` seconds.
///
/// A failing sweep is logged and the loop carries on. The returned handle
/// is aborted during graceful shutdown.
pub fn spawn_cleanup_task(cache: Arc<CacheFacade>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiry sweep with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.purge_expired().await {
                Ok(0) => debug!("expiry sweep: no expired entries found"),
                Ok(removed) => info!("expiry sweep: removed {} expired entries", removed),
                Err(err) => warn!(error = %err, "expiry sweep failed"),
            }
        }
    })
}
