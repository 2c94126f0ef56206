// Distance cache maintenance
// Periodically drops expired distance cache entries in the background

use crate::application::shutdown::ShutdownToken;
use crate::error::Result;
use crate::port::DistanceCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Cache maintenance scheduler
///
/// Runs `purge_expired` on the distance cache every `interval` until the
/// shutdown token fires.
pub struct CacheMaintenanceScheduler {
    cache: Arc<dyn DistanceCache>,
    interval: Duration,
}

impl CacheMaintenanceScheduler {
    pub fn new(cache: Arc<dyn DistanceCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Maintenance loop; spawn with `tokio::spawn`
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Cache maintenance scheduler started"
        );

        let mut tick = interval(self.interval);
        // first tick completes immediately
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.run_now().await {
                        error!(error = ?e, "Scheduled cache purge failed");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Cache maintenance scheduler stopped");
                    return;
                }
            }
        }
    }

    /// Purge immediately, returning the number of dropped entries
    pub async fn run_now(&self) -> Result<u64> {
        let purged = self.cache.purge_expired().await?;
        if purged > 0 {
            info!(purged, "Expired distance cache entries purged");
        } else {
            debug!("No expired distance cache entries");
        }
        Ok(purged)
    }
}
