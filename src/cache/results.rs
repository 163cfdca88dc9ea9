//! Query result cache.
//!
//! Maps canonical selector keys to the ordered page ids they resolved to.
//! Entries carry no TTL: any write to the backing store clears the whole
//! cache, trading partial-invalidation cleverness for correctness.

use std::sync::RwLock;

use lru::LruCache;
use tracing::debug;

use crate::domain::{PageCollection, PageId};
use crate::store::FindOptions;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::results";

/// Selector-keyed cache of ordered result ids.
pub struct QueryCache {
    entries: RwLock<LruCache<String, Vec<PageId>>>,
}

impl QueryCache {
    /// Create a new query cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.query_cache_limit_non_zero())),
        }
    }

    /// Cache the ids behind `key`.
    ///
    /// Refuses single-result lookups whose sole match is unpublished or
    /// worse: such results are access/state-sensitive and must not be reused
    /// blindly. Returns whether the entry was stored.
    pub fn store(&self, key: &str, options: &FindOptions, results: &PageCollection) -> bool {
        if options.find_one && results.len() == 1 {
            if let Some(page) = results.first() {
                let status = rw_read(page, SOURCE, "store.status").status;
                if status.at_or_above_unpublished() {
                    debug!(key, "Query cache store refused: unpublished single result");
                    return false;
                }
            }
        }
        rw_write(&self.entries, SOURCE, "store").put(key.to_string(), results.ids());
        true
    }

    /// Ordered ids cached under `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<Vec<PageId>> {
        rw_write(&self.entries, SOURCE, "lookup").get(key).cloned()
    }

    /// Drop a single entry (used when a cached id is no longer resident).
    pub fn forget(&self, key: &str) {
        rw_write(&self.entries, SOURCE, "forget").pop(key);
    }

    /// Coarse invalidation: any write to the backing store clears everything.
    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Page, PageStatus};

    fn collection(selector: &str, ids: &[u64]) -> PageCollection {
        let pages = ids
            .iter()
            .map(|id| Page::new(PageId(*id), PageId::ROOT, format!("page-{id}"), "basic"))
            .map(Page::into_shared)
            .collect();
        PageCollection::from_pages(selector, pages)
    }

    #[test]
    fn store_then_lookup_preserves_order() {
        let cache = QueryCache::new(&CacheConfig::default());
        let results = collection("template=basic", &[9, 5, 12]);

        assert!(cache.store("template=basic,k", &FindOptions::default(), &results));
        assert_eq!(
            cache.lookup("template=basic,k"),
            Some(vec![PageId(9), PageId(5), PageId(12)])
        );
    }

    #[test]
    fn lookup_miss_is_none() {
        let cache = QueryCache::new(&CacheConfig::default());
        assert!(cache.lookup("nothing").is_none());
    }

    #[test]
    fn unpublished_single_result_is_refused() {
        let cache = QueryCache::new(&CacheConfig::default());
        let mut page = Page::new(PageId(5), PageId::ROOT, "draft", "basic");
        page.status |= PageStatus::UNPUBLISHED;
        let results = PageCollection::from_pages("name=draft", vec![page.into_shared()]);

        assert!(!cache.store("name=draft,k", &FindOptions::one(), &results));
        assert!(cache.lookup("name=draft,k").is_none());
    }

    #[test]
    fn unpublished_result_in_plain_find_is_cached() {
        let cache = QueryCache::new(&CacheConfig::default());
        let mut page = Page::new(PageId(5), PageId::ROOT, "draft", "basic");
        page.status |= PageStatus::UNPUBLISHED;
        let results = PageCollection::from_pages("name=draft", vec![page.into_shared()]);

        assert!(cache.store("name=draft,k", &FindOptions::default(), &results));
    }

    #[test]
    fn clear_drops_everything() {
        let cache = QueryCache::new(&CacheConfig::default());
        cache.store("a,k", &FindOptions::default(), &collection("a", &[2]));
        cache.store("b,k", &FindOptions::default(), &collection("b", &[3]));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let config = CacheConfig {
            query_cache_limit: 2,
            ..Default::default()
        };
        let cache = QueryCache::new(&config);
        cache.store("a,k", &FindOptions::default(), &collection("a", &[2]));
        cache.store("b,k", &FindOptions::default(), &collection("b", &[3]));
        cache.store("c,k", &FindOptions::default(), &collection("c", &[4]));

        assert!(cache.lookup("a,k").is_none());
        assert!(cache.lookup("b,k").is_some());
        assert!(cache.lookup("c,k").is_some());
    }
}
