//! Per-identity TTL cache decorator for permissions providers

use super::PermissionsProvider;
use crate::error::Result;
use crate::index::PermissionIndex;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Cached entry with absolute expiry
#[derive(Clone)]
struct CacheEntry {
    expires_at: Instant,
    value: PermissionIndex,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from a live entry
    pub hits: usize,
    /// Lookups forwarded to the inner provider
    pub misses: usize,
    /// Expired entries removed on lookup
    pub expirations: usize,
    /// Entries currently held, expired or not
    pub entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Wraps any provider with an in-memory, per-identity TTL cache
///
/// - Entries live until `ttl` elapses or they are invalidated; there is no
///   size bound and no LRU eviction
/// - Expired entries are removed when they are looked up
/// - Concurrent misses for the same identity may each call the inner
///   provider; the last write wins
/// - `invalidate` always cascades to the inner provider
///
/// # Example
///
/// ```rust
/// use rbac_authz::provider::{StoragePermissionsProvider, TtlCache};
/// use rbac_authz::storage::InMemoryRoleStore;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let base = StoragePermissionsProvider::new(Arc::new(InMemoryRoleStore::new()));
/// let cached = TtlCache::new(base, Duration::from_secs(300));
/// assert_eq!(cached.stats().entries, 0);
/// ```
pub struct TtlCache<P> {
    inner: P,
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    expirations: AtomicUsize,
}

impl<P: PermissionsProvider> TtlCache<P> {
    /// Wrap `inner` with a cache whose entries live for `ttl`
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            expirations: AtomicUsize::new(0),
        }
    }

    /// Entry lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Wrapped provider
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn lookup(&self, identity: &str) -> Option<PermissionIndex> {
        let now = Instant::now();
        let entry = self.entries.get(identity)?;

        if entry.expires_at > now {
            return Some(entry.value.clone());
        }

        // Release the shard read guard before removing
        drop(entry);
        self.evict_expired(identity, now);
        None
    }

    /// Remove the entry if it is still expired at `now`; a concurrent refresh
    /// is kept and not counted
    fn evict_expired(&self, identity: &str, now: Instant) -> bool {
        let removed = self
            .entries
            .remove_if(identity, |_, entry| entry.expires_at <= now)
            .is_some();

        if removed {
            self.expirations.fetch_add(1, Ordering::Relaxed);
            trace!(identity, "Cache entry expired");
        }
        removed
    }
}

#[async_trait]
impl<P: PermissionsProvider> PermissionsProvider for TtlCache<P> {
    async fn get_permissions_by_identity(&self, identity: &str) -> Result<PermissionIndex> {
        if let Some(value) = self.lookup(identity) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(identity, "Cache hit");
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = self.inner.get_permissions_by_identity(identity).await?;

        self.entries.insert(
            identity.to_string(),
            CacheEntry {
                expires_at: Instant::now() + self.ttl,
                value: value.clone(),
            },
        );

        Ok(value)
    }

    fn invalidate(&self, identity: Option<&str>) {
        match identity {
            Some(identity) => {
                self.entries.remove(identity);
                debug!(identity, "Invalidated cached permissions");
            }
            None => {
                self.entries.clear();
                debug!("Invalidated all cached permissions");
            }
        }

        self.inner.invalidate(identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PermissionGrant;
    use std::sync::Arc;

    /// Counts calls and returns a fixed index
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        invalidations: AtomicUsize,
    }

    #[async_trait]
    impl PermissionsProvider for CountingProvider {
        async fn get_permissions_by_identity(&self, _identity: &str) -> Result<PermissionIndex> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PermissionIndex::from_grants(vec![PermissionGrant::allow("Exibir", "Relatorios")]))
        }

        fn invalidate(&self, _identity: Option<&str>) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_inner() {
        let inner = Arc::new(CountingProvider::default());
        let cache = TtlCache::new(Arc::clone(&inner), Duration::from_secs(60));

        let first = cache.get_permissions_by_identity("ana@gov.br").await.unwrap();
        let second = cache.get_permissions_by_identity("ana@gov.br").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_cache_ttl() {
        let inner = Arc::new(CountingProvider::default());
        let cache = TtlCache::new(Arc::clone(&inner), Duration::from_millis(50));

        cache.get_permissions_by_identity("ana@gov.br").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cache.get_permissions_by_identity("ana@gov.br").await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_invalidate_cascades() {
        let inner = Arc::new(CountingProvider::default());
        let cache = TtlCache::new(Arc::clone(&inner), Duration::from_secs(60));

        cache.invalidate(Some("ana@gov.br"));
        cache.invalidate(None);

        assert_eq!(inner.invalidations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refreshed_entry_is_not_evicted_or_counted() {
        let inner = Arc::new(CountingProvider::default());
        let cache = TtlCache::new(Arc::clone(&inner), Duration::from_secs(60));

        // Entry refreshed by another task after this one saw it expired
        let seen_expired_at = Instant::now();
        cache.get_permissions_by_identity("ana@gov.br").await.unwrap();

        assert!(!cache.evict_expired("ana@gov.br", seen_expired_at));
        let stats = cache.stats();
        assert_eq!(stats.expirations, 0);
        assert_eq!(stats.entries, 1);

        // Nothing to remove: not counted either
        assert!(!cache.evict_expired("bob@gov.br", Instant::now()));
        assert_eq!(cache.stats().expirations, 0);
    }
}
