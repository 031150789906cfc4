//! Per-session cache of new-item searches.
//!
//! Uses a `moka` async cache keyed by `(session_id, days_old)`. A miss calls
//! the driver; errors are not cached.
//!
//! - Max entries: 1,000
//! - TTL: 10 minutes

use crate::driver::IlsDriver;
use crate::error::IlsResult;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Maximum number of cached searches.
const MAX_CACHE_ENTRIES: u64 = 1_000;

/// Default time-to-live for cached searches (seconds).
pub const DEFAULT_TTL_SECONDS: u64 = 600;

/// Injected cache of new-item record ids.
#[derive(Clone)]
pub struct NewItemsCache {
    cache: Cache<(String, u32), Arc<Vec<String>>>,
}

impl NewItemsCache {
    /// Create a cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHE_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Cached result for this session, or a fresh driver search.
    pub async fn get_or_fetch(
        &self,
        session_id: &str,
        days_old: u32,
        driver: &dyn IlsDriver,
    ) -> IlsResult<Arc<Vec<String>>> {
        let key = (session_id.to_string(), days_old);
        if let Some(ids) = self.cache.get(&key).await {
            return Ok(ids);
        }

        let ids = Arc::new(driver.find_new_items(days_old).await?);
        debug!(days_old, count = ids.len(), "New items cached");
        self.cache.insert(key, Arc::clone(&ids)).await;
        Ok(ids)
    }

    /// Drop one cached search.
    pub async fn invalidate(&self, session_id: &str, days_old: u32) {
        self.cache
            .invalidate(&(session_id.to_string(), days_old))
            .await;
    }
}

impl Default for NewItemsCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECONDS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IlsError;
    use crate::holding::Holding;
    use crate::profile::{PatronProfile, ProfileUpdate};
    use async_trait::async_trait;
    use libris_core::AuthError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingDriver {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl IlsDriver for CountingDriver {
        fn dialect(&self) -> &'static str {
            "counting"
        }

        async fn authenticate_patron(&self, _: &str, _: &str) -> Result<PatronProfile, AuthError> {
            Err(AuthError::InvalidCredentials)
        }

        async fn fetch_profile(&self, id: &str) -> IlsResult<PatronProfile> {
            Ok(PatronProfile::new(id))
        }

        async fn fetch_holdings(
            &self,
            _: &str,
            _: Option<&PatronProfile>,
        ) -> IlsResult<Vec<Holding>> {
            Ok(Vec::new())
        }

        async fn update_profile(&self, _: &str, _: &ProfileUpdate) -> IlsResult<()> {
            Ok(())
        }

        async fn find_new_items(&self, days_old: u32) -> IlsResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(IlsError::server_error(503, "down"));
            }
            Ok(vec![format!("rec-{days_old}")])
        }
    }

    #[tokio::test]
    async fn test_cache_hits_per_session_and_days() {
        let cache = NewItemsCache::default();
        let driver = CountingDriver::default();

        let first = cache.get_or_fetch("s1", 7, &driver).await.unwrap();
        let second = cache.get_or_fetch("s1", 7, &driver).await.unwrap();
        assert_eq!(*first, vec!["rec-7"]);
        assert_eq!(first, second);
        assert_eq!(driver.calls.load(Ordering::SeqCst), 1);

        cache.get_or_fetch("s2", 7, &driver).await.unwrap();
        cache.get_or_fetch("s1", 30, &driver).await.unwrap();
        assert_eq!(driver.calls.load(Ordering::SeqCst), 3);

        cache.invalidate("s1", 7).await;
        cache.get_or_fetch("s1", 7, &driver).await.unwrap();
        assert_eq!(driver.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = NewItemsCache::default();
        let driver = CountingDriver {
            fail: true,
            ..Default::default()
        };
        assert!(cache.get_or_fetch("s1", 7, &driver).await.is_err());
        assert!(cache.get_or_fetch("s1", 7, &driver).await.is_err());
        assert_eq!(driver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = NewItemsCache::new(Duration::from_millis(50));
        let driver = CountingDriver::default();
        cache.get_or_fetch("s1", 7, &driver).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        cache.get_or_fetch("s1", 7, &driver).await.unwrap();
        assert_eq!(driver.calls.load(Ordering::SeqCst), 2);
    }
}
