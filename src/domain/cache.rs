//! Time-boxed single-value cache.

use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Holds one computed value for a fixed time-to-live.
///
/// Holds the catalogue overview; `ServiceContext::commit` invalidates it
/// whenever an event or registration changes.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    slot: RwLock<Option<(Instant, T)>>,
}

impl<T: Clone> TtlCache<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Returns the cached value if it has not expired.
    pub async fn get(&self) -> Option<T> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    /// Stores a fresh value.
    pub async fn put(&self, value: T) {
        *self.slot.write().await = Some((Instant::now(), value));
    }

    /// Drops the cached value.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_value_until_invalidated() {
        let cache = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.get().await, None);
        cache.put(7_u32).await;
        assert_eq!(cache.get().await, Some(7));
        cache.invalidate().await;
        assert_eq!(cache.get().await, None);
    }

    #[tokio::test]
    async fn zero_ttl_never_hits() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.put("stats").await;
        assert_eq!(cache.get().await, None);
    }
}
