//! Identity cache: at most one live page instance per id.
//!
//! The cache owns the canonical `SharedPage` for every resident id; the query
//! cache and all callers hold clones of that handle, so mutations through any
//! of them observe the same instance.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tracing::debug;

use crate::domain::{Page, PageId, SharedPage};

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::identity";

/// Ids that [`IdentityCache::remove_all`] must leave resident.
///
/// The current session actor and the active locale page stay cached across
/// bulk evictions so request-scoped invariants keep holding.
#[derive(Debug, Clone, Copy, Default)]
pub struct CachePins {
    pub actor: Option<PageId>,
    pub locale: Option<PageId>,
}

impl CachePins {
    fn is_pinned(&self, id: PageId) -> bool {
        self.actor == Some(id) || self.locale == Some(id)
    }
}

/// Process-local single-instance-per-id page cache.
pub struct IdentityCache {
    pages: RwLock<HashMap<PageId, SharedPage>>,
    /// Disposable batch tags; `remove_group` evicts a whole tag at once.
    groups: RwLock<HashMap<String, HashSet<PageId>>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
        }
    }

    // ========================================================================
    // Lookup and registration
    // ========================================================================

    /// Cached instance for `id`, if resident.
    pub fn get(&self, id: PageId) -> Option<SharedPage> {
        rw_read(&self.pages, SOURCE, "get").get(&id).cloned()
    }

    /// Register a page under its id and return the shared handle.
    ///
    /// Unsaved pages (id zero) are never cached; the handle is still returned
    /// so callers can keep working with the page.
    pub fn put(&self, page: Page) -> SharedPage {
        let shared = page.into_shared();
        self.put_shared(shared.clone(), None);
        shared
    }

    /// Register an existing handle, optionally tagging it with a cache group.
    pub fn put_shared(&self, page: SharedPage, group: Option<&str>) {
        let id = rw_read(&page, SOURCE, "put.id").id;
        if id.is_unsaved() {
            return;
        }
        rw_write(&page, SOURCE, "put.mark_loaded").mark_loaded();
        rw_write(&self.pages, SOURCE, "put").insert(id, page);
        if let Some(group) = group {
            rw_write(&self.groups, SOURCE, "put.group")
                .entry(group.to_string())
                .or_default()
                .insert(id);
        }
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Evict `id`. Unless `shallow`, the page also releases its internal
    /// caches. Returns whether an entry existed.
    pub fn remove(&self, id: PageId, shallow: bool) -> bool {
        let removed = rw_write(&self.pages, SOURCE, "remove").remove(&id);
        let Some(page) = removed else {
            return false;
        };
        if !shallow {
            rw_write(&page, SOURCE, "remove.release").release_caches();
        }
        rw_write(&self.groups, SOURCE, "remove.groups").retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
        true
    }

    /// Evict every page registered under `group`. Returns the count evicted.
    pub fn remove_group(&self, group: &str) -> usize {
        let Some(ids) = rw_write(&self.groups, SOURCE, "remove_group").remove(group) else {
            return 0;
        };
        let mut pages = rw_write(&self.pages, SOURCE, "remove_group.pages");
        let mut evicted = 0;
        for id in ids {
            if let Some(page) = pages.remove(&id) {
                rw_write(&page, SOURCE, "remove_group.release").release_caches();
                evicted += 1;
            }
        }
        evicted
    }

    /// Evict everything except pinned ids and pages with children loaded
    /// (evicting those would dangle parent/child references).
    ///
    /// Best-effort: never fails. Returns the count evicted.
    pub fn remove_all(&self, pins: CachePins) -> usize {
        let mut pages = rw_write(&self.pages, SOURCE, "remove_all");
        let before = pages.len();
        pages.retain(|id, page| {
            if pins.is_pinned(*id) {
                return true;
            }
            if rw_read(page, SOURCE, "remove_all.children").has_children_loaded() {
                return true;
            }
            rw_write(page, SOURCE, "remove_all.release").release_caches();
            false
        });
        let evicted = before - pages.len();
        drop(pages);
        rw_write(&self.groups, SOURCE, "remove_all.groups").clear();
        debug!(evicted, "Identity cache cleared");
        evicted
    }

    pub fn len(&self) -> usize {
        rw_read(&self.pages, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn sample_page(id: u64) -> Page {
        Page::new(PageId(id), PageId::ROOT, format!("page-{id}"), "basic")
    }

    #[test]
    fn put_then_get_returns_the_same_instance() {
        let cache = IdentityCache::new();
        let shared = cache.put(sample_page(2));

        let cached = cache.get(PageId(2)).expect("cached page");
        assert!(Arc::ptr_eq(&shared, &cached));
        assert!(rw_read(&cached, SOURCE, "test").is_loaded());
    }

    #[test]
    fn unsaved_pages_are_never_cached() {
        let cache = IdentityCache::new();
        cache.put(sample_page(0));

        assert!(cache.is_empty());
        assert!(cache.get(PageId::UNSAVED).is_none());
    }

    #[test]
    fn deep_remove_releases_internal_caches() {
        let cache = IdentityCache::new();
        let shared = cache.put(sample_page(2));
        rw_write(&shared, SOURCE, "test").memoize_path("/page-2/");

        assert!(cache.remove(PageId(2), false));
        assert!(rw_read(&shared, SOURCE, "test").path_hint().is_none());
        assert!(!cache.remove(PageId(2), false));
    }

    #[test]
    fn shallow_remove_keeps_internal_caches() {
        let cache = IdentityCache::new();
        let shared = cache.put(sample_page(2));
        rw_write(&shared, SOURCE, "test").memoize_path("/page-2/");

        assert!(cache.remove(PageId(2), true));
        assert_eq!(
            rw_read(&shared, SOURCE, "test").path_hint(),
            Some("/page-2/")
        );
    }

    #[test]
    fn group_eviction_is_scoped() {
        let cache = IdentityCache::new();
        cache.put_shared(sample_page(2).into_shared(), Some("batch"));
        cache.put_shared(sample_page(3).into_shared(), Some("batch"));
        cache.put(sample_page(4));

        assert_eq!(cache.remove_group("batch"), 2);
        assert!(cache.get(PageId(2)).is_none());
        assert!(cache.get(PageId(3)).is_none());
        assert!(cache.get(PageId(4)).is_some());
        assert_eq!(cache.remove_group("batch"), 0);
    }

    #[test]
    fn remove_all_honors_pins_and_loaded_children() {
        let cache = IdentityCache::new();
        cache.put(sample_page(2));
        cache.put(sample_page(3));
        let parent = cache.put(sample_page(4));
        rw_write(&parent, SOURCE, "test").attach_children(vec![PageId(2)]);

        let pins = CachePins {
            actor: Some(PageId(3)),
            locale: None,
        };
        assert_eq!(cache.remove_all(pins), 1);

        assert!(cache.get(PageId(2)).is_none());
        assert!(cache.get(PageId(3)).is_some(), "pinned actor survives");
        assert!(cache.get(PageId(4)).is_some(), "loaded children survive");
    }
}
