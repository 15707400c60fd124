//! Read-through catalog cache
//!
//! Server type and datacenter listings change rarely and are read on every
//! instance creation in conformance mode. They are kept in memory for a TTL.
//! Concurrent refreshes race benignly: the last writer wins.

use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Cached<T> {
    fetched_at: Instant,
    items: Vec<T>,
}

/// TTL cache for one catalog listing
pub struct CatalogCache<T: Clone> {
    ttl: Duration,
    slot: RwLock<Option<Cached<T>>>,
}

impl<T: Clone> CatalogCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Fresh, non-empty contents as an owned copy
    ///
    /// Stale, empty or poisoned entries return `None` so the caller falls
    /// through to a live call.
    pub fn fresh(&self) -> Option<Vec<T>> {
        let slot = self.slot.read().ok()?;
        let cached = slot.as_ref()?;
        if cached.items.is_empty() || cached.fetched_at.elapsed() >= self.ttl {
            return None;
        }
        Some(cached.items.clone())
    }

    pub fn store(&self, items: Vec<T>) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some(Cached {
                fetched_at: Instant::now(),
                items,
            });
        }
    }

    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_misses() {
        let cache: CatalogCache<u32> = CatalogCache::new(Duration::from_secs(60));
        assert!(cache.fresh().is_none());
    }

    #[test]
    fn test_store_then_hit() {
        let cache = CatalogCache::new(Duration::from_secs(60));
        cache.store(vec![1, 2, 3]);
        assert_eq!(cache.fresh(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_returned_copy_is_detached() {
        let cache = CatalogCache::new(Duration::from_secs(60));
        cache.store(vec![String::from("cx22")]);

        let mut copy = cache.fresh().unwrap();
        copy.push(String::from("cx32"));

        assert_eq!(cache.fresh().unwrap().len(), 1);
    }

    #[test]
    fn test_stale_entry_misses() {
        let cache = CatalogCache::new(Duration::ZERO);
        cache.store(vec![1]);
        assert!(cache.fresh().is_none());
    }

    #[test]
    fn test_empty_listing_misses() {
        let cache: CatalogCache<u32> = CatalogCache::new(Duration::from_secs(60));
        cache.store(Vec::new());
        assert!(cache.fresh().is_none());
    }

    #[test]
    fn test_invalidate() {
        let cache = CatalogCache::new(Duration::from_secs(60));
        cache.store(vec![1]);
        cache.invalidate();
        assert!(cache.fresh().is_none());
    }
}
