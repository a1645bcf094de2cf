//! Periodic removal of expired cache entries.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cache::ResponseCache;

/// Background task that calls `clear_expired` on a fixed interval.
///
/// Housekeeping only; stale entries are still served as fallback until a
/// sweep removes them.
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    cache: ResponseCache,
    interval: Duration,
}

impl ExpirySweeper {
    /// Shortest interval a sweeper runs at; a zero interval is raised to it.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new(cache: ResponseCache, interval: Duration) -> Self {
        Self {
            cache,
            interval: interval.max(Self::MIN_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one sweep and returns the number of rows removed. Errors are
    /// logged, not propagated.
    pub async fn sweep_once(&self) -> usize {
        match self.cache.clear_expired().await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::info!(removed, "expiry sweep removed cache entries");
                } else {
                    tracing::debug!("expiry sweep found nothing to remove");
                }
                removed
            }
            Err(error) => {
                tracing::warn!(error = %error, "expiry sweep failed");
                0
            }
        }
    }

    /// Sweeps every `interval` until `shutdown` is cancelled. Returns the
    /// total number of rows removed.
    pub async fn run(self, shutdown: CancellationToken) -> usize {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "expiry sweeper starting"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick completes immediately
        interval.tick().await;

        let mut total = 0;
        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    tracing::info!(total_removed = total, "expiry sweeper shutting down");
                    break;
                }

                _ = interval.tick() => {
                    total += self.sweep_once().await;
                }
            }
        }
        total
    }

    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<usize> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundlayer_store::{CacheConfig, CacheStore, ManualClock};
    use serde_json::json;
    use std::sync::Arc;

    fn cache_with_clock(dir: &tempfile::TempDir, clock: &ManualClock) -> ResponseCache {
        let store = CacheStore::open_with_clock(
            CacheConfig::at_path(dir.path().join("cache.duckdb")),
            Arc::new(clock.clone()),
        )
        .expect("open store");
        ResponseCache::new(store)
    }

    #[tokio::test]
    async fn sweep_once_removes_only_expired_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = ManualClock::at_epoch_2024();
        let cache = cache_with_clock(&dir, &clock);
        cache
            .set("short", &json!(1), Duration::from_secs(10))
            .await
            .expect("set");
        cache
            .set("long", &json!(2), Duration::from_secs(1000))
            .await
            .expect("set");
        clock.advance(Duration::from_secs(11));

        let sweeper = ExpirySweeper::new(cache.clone(), Duration::from_secs(600));
        assert_eq!(sweeper.sweep_once().await, 1);
        assert!(cache.get("long").await.expect("get").is_some());
        assert!(cache.get("short").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = ManualClock::at_epoch_2024();
        let cache = cache_with_clock(&dir, &clock);
        cache
            .set("short", &json!(1), Duration::from_secs(1))
            .await
            .expect("set");
        clock.advance(Duration::from_secs(5));

        let shutdown = CancellationToken::new();
        let handle = ExpirySweeper::new(cache, Duration::from_millis(20)).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();

        let removed = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper stops")
            .expect("sweeper task");
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn zero_interval_is_raised_to_the_minimum() {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = ManualClock::at_epoch_2024();
        let sweeper = ExpirySweeper::new(cache_with_clock(&dir, &clock), Duration::ZERO);
        assert_eq!(sweeper.interval(), ExpirySweeper::MIN_INTERVAL);

        let shutdown = CancellationToken::new();
        let handle = sweeper.spawn(shutdown.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        let removed = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper stops")
            .expect("sweeper task does not panic");
        assert_eq!(removed, 0);
    }
}
