//! Per-policy price cache

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::{sort_by_timestamp, PricePoint};

/// Append-only price history for one policy, sorted by timestamp.
///
/// Writers serialize on `update` for a whole bootstrap or poll cycle,
/// network round-trip included. The points themselves sit behind a
/// separate lock that is only held for appends and copies, so snapshot
/// readers never wait on a query.
#[derive(Debug, Default)]
pub struct PriceCache {
    update: Mutex<()>,
    points: RwLock<Vec<PricePoint>>,
}

/// Exclusive write access to a cache, held by its poller
pub struct CacheUpdate<'a> {
    _guard: MutexGuard<'a, ()>,
    cache: &'a PriceCache,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access
    pub async fn begin_update(&self) -> CacheUpdate<'_> {
        CacheUpdate {
            _guard: self.update.lock().await,
            cache: self,
        }
    }

    /// Copy of the current contents
    pub async fn snapshot(&self) -> Vec<PricePoint> {
        self.points.read().await.clone()
    }

    /// Timestamp of the newest cached point
    pub async fn high_water_mark(&self) -> Option<DateTime<Utc>> {
        self.points.read().await.last().map(|point| point.timestamp)
    }
}

impl CacheUpdate<'_> {
    /// Replace the contents with `points`, sorted ascending by timestamp
    pub async fn replace(&self, mut points: Vec<PricePoint>) {
        sort_by_timestamp(&mut points);
        *self.cache.points.write().await = points;
    }

    /// Append points already in timestamp order and not older than the tail
    pub async fn append(&self, points: &[PricePoint]) {
        let mut cached = self.cache.points.write().await;
        debug_assert!(points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        debug_assert!(match (cached.last(), points.first()) {
            (Some(last), Some(first)) => last.timestamp <= first.timestamp,
            _ => true,
        });
        cached.extend_from_slice(points);
    }

    pub async fn high_water_mark(&self) -> Option<DateTime<Utc>> {
        self.cache.high_water_mark().await
    }

    /// Run `f` against the cached points without copying them
    pub async fn inspect<R>(&self, f: impl FnOnce(&[PricePoint]) -> R) -> R {
        let cached = self.cache.points.read().await;
        f(&cached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::test_support::{at, point};
    use std::time::Duration;

    #[tokio::test]
    async fn test_replace_sorts_bootstrap_result() {
        let cache = PriceCache::new();
        {
            let update = cache.begin_update().await;
            update.replace(vec![point(3, 0.3), point(1, 0.1), point(2, 0.2)]).await;
        }
        assert_eq!(cache.snapshot().await, vec![point(1, 0.1), point(2, 0.2), point(3, 0.3)]);
        assert_eq!(cache.high_water_mark().await, Some(at(3)));
    }

    #[tokio::test]
    async fn test_append_extends_tail() {
        let cache = PriceCache::new();
        let update = cache.begin_update().await;
        update.replace(vec![point(1, 0.1)]).await;
        update.append(&[point(2, 0.2), point(4, 0.4)]).await;
        assert_eq!(update.high_water_mark().await, Some(at(4)));
        assert_eq!(update.inspect(|points| points.len()).await, 3);
    }

    #[tokio::test]
    async fn test_empty_cache_has_no_high_water_mark() {
        let cache = PriceCache::new();
        assert!(cache.snapshot().await.is_empty());
        assert_eq!(cache.high_water_mark().await, None);
    }

    #[tokio::test]
    async fn test_snapshot_does_not_wait_for_update_lock() {
        let cache = PriceCache::new();
        let update = cache.begin_update().await;
        update.replace(vec![point(1, 0.1)]).await;

        let snapshot = tokio::time::timeout(Duration::from_secs(1), cache.snapshot())
            .await
            .expect("snapshot blocked behind update lock");
        assert_eq!(snapshot.len(), 1);
        drop(update);
    }

    #[tokio::test]
    async fn test_second_writer_waits_for_first() {
        let cache = PriceCache::new();
        let first = cache.begin_update().await;
        let second = tokio::time::timeout(Duration::from_millis(50), cache.begin_update()).await;
        assert!(second.is_err());
        drop(first);
        assert!(cache.snapshot().await.is_empty());
    }
}
