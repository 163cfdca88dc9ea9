//! Store session: the explicit per-request context.
//!
//! One value owns the identity cache, the query cache, the field registry,
//! the locale context and the storage driver. Everything classic CMS cores
//! keep in process-wide statics lives here instead, passed to operations.
//!
//! Deployments that reuse a worker process across requests must call
//! [`StoreSession::uncache_all`] at the request boundary; without it, cached
//! state leaks from one request into the next.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::cache::{
    CacheConfig, CachePins, IdentityCache, QueryCache, rw_read, rw_write, selector_cache_key,
};
use crate::config::StoreSettings;
use crate::domain::{FieldRegistry, PageCollection, PageId, PagePlaceholder, SharedPage};

use super::driver::{FindOptions, LoadOptions, StorageDriver};
use super::error::StorageError;
use super::lazy::LazyPages;
use super::sortfield::Sortfields;

const SOURCE: &str = "store::session";

/// Active locale used to discriminate cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleContext {
    id: u32,
    default: bool,
}

impl LocaleContext {
    pub const DEFAULT: LocaleContext = LocaleContext {
        id: 0,
        default: true,
    };

    pub fn new(id: u32, default: bool) -> Self {
        Self { id, default }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_default(&self) -> bool {
        self.default
    }
}

impl Default for LocaleContext {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The store's composition root: caches, registry, locale state and driver.
pub struct StoreSession {
    driver: Arc<dyn StorageDriver>,
    identity: IdentityCache,
    queries: QueryCache,
    fields: Arc<FieldRegistry>,
    sortfields: Sortfields,
    config: RwLock<CacheConfig>,
    locale: RwLock<LocaleContext>,
    actor_page: RwLock<Option<PageId>>,
    locale_page: RwLock<Option<PageId>>,
    /// Ids mid-load, guarding against re-entrant duplicate loads.
    loading: RwLock<Vec<PageId>>,
    output_formatting: AtomicBool,
}

impl StoreSession {
    pub fn new(driver: Arc<dyn StorageDriver>, fields: FieldRegistry, config: CacheConfig) -> Self {
        let fields = Arc::new(fields);
        Self {
            sortfields: Sortfields::new(driver.clone(), fields.clone()),
            queries: QueryCache::new(&config),
            identity: IdentityCache::new(),
            driver,
            fields,
            config: RwLock::new(config),
            locale: RwLock::new(LocaleContext::DEFAULT),
            actor_page: RwLock::new(None),
            locale_page: RwLock::new(None),
            loading: RwLock::new(Vec::new()),
            output_formatting: AtomicBool::new(false),
        }
    }

    /// Build a session from loaded [`StoreSettings`].
    ///
    /// The cache knobs (chunk size, query-cache enable flag, query-cache
    /// capacity) map onto [`CacheConfig`], and the session starts in the
    /// configured default locale.
    pub fn from_settings(
        driver: Arc<dyn StorageDriver>,
        fields: FieldRegistry,
        settings: &StoreSettings,
    ) -> Self {
        let session = Self::new(driver, fields, CacheConfig::from(&settings.cache));
        session.set_locale(settings.locale_context(settings.locale.default_locale_id));
        session
    }

    // ========================================================================
    // Context accessors
    // ========================================================================

    pub fn identity(&self) -> &IdentityCache {
        &self.identity
    }

    pub fn queries(&self) -> &QueryCache {
        &self.queries
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn sortfields(&self) -> &Sortfields {
        &self.sortfields
    }

    pub fn driver(&self) -> &Arc<dyn StorageDriver> {
        &self.driver
    }

    pub fn config(&self) -> CacheConfig {
        rw_read(&self.config, SOURCE, "config").clone()
    }

    /// Swap runtime configuration. The chunk size and the query-cache enable
    /// flag are read live; the query-cache capacity stays as constructed.
    pub fn set_config(&self, config: CacheConfig) {
        *rw_write(&self.config, SOURCE, "set_config") = config;
    }

    pub(crate) fn chunk_size(&self) -> NonZeroUsize {
        rw_read(&self.config, SOURCE, "chunk_size").chunk_size_non_zero()
    }

    fn query_cache_enabled(&self) -> bool {
        rw_read(&self.config, SOURCE, "query_cache_enabled").enable_query_cache
    }

    pub fn locale(&self) -> LocaleContext {
        *rw_read(&self.locale, SOURCE, "locale")
    }

    pub fn set_locale(&self, locale: LocaleContext) {
        *rw_write(&self.locale, SOURCE, "set_locale") = locale;
    }

    pub fn output_formatting(&self) -> bool {
        self.output_formatting.load(Ordering::Relaxed)
    }

    pub fn set_output_formatting(&self, on: bool) {
        self.output_formatting.store(on, Ordering::Relaxed);
    }

    /// Pin the current actor's page; it survives [`Self::uncache_all`].
    pub fn pin_actor(&self, id: Option<PageId>) {
        *rw_write(&self.actor_page, SOURCE, "pin_actor") = id;
    }

    /// Pin the active locale's page; it survives [`Self::uncache_all`].
    pub fn pin_locale_page(&self, id: Option<PageId>) {
        *rw_write(&self.locale_page, SOURCE, "pin_locale_page") = id;
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Cached or freshly loaded page for `id`.
    pub fn get(&self, id: PageId) -> Result<Option<SharedPage>, StorageError> {
        Ok(self
            .get_by_ids(&[id], &LoadOptions::default())?
            .into_iter()
            .next())
    }

    /// Batch load preserving input order; identity-cache hits short-circuit
    /// and have their request-scoped formatting flag refreshed.
    pub fn get_by_ids(
        &self,
        ids: &[PageId],
        options: &LoadOptions,
    ) -> Result<Vec<SharedPage>, StorageError> {
        let formatting = self.output_formatting();
        let mut resolved: Vec<(PageId, Option<SharedPage>)> = Vec::with_capacity(ids.len());
        let mut missing: Vec<PageId> = Vec::new();

        for &id in ids {
            match self.identity.get(id) {
                Some(page) => {
                    rw_write(&page, SOURCE, "get_by_ids.refresh")
                        .set_output_formatting(formatting);
                    resolved.push((id, Some(page)));
                }
                None => {
                    if !id.is_unsaved() && !self.is_loading(id) {
                        missing.push(id);
                    }
                    resolved.push((id, None));
                }
            }
        }

        if !missing.is_empty() {
            self.push_loading(&missing);
            let loaded = self.driver.load_by_ids(&missing);
            self.pop_loading(missing.len());

            let mut by_id: HashMap<PageId, SharedPage> = HashMap::new();
            for mut page in loaded? {
                page.set_output_formatting(formatting);
                let id = page.id;
                let shared = page.into_shared();
                if options.cache {
                    self.identity
                        .put_shared(shared.clone(), options.cache_group.as_deref());
                }
                by_id.insert(id, shared);
            }
            for slot in &mut resolved {
                if slot.1.is_none() {
                    slot.1 = by_id.get(&slot.0).cloned();
                }
            }
        }

        Ok(resolved.into_iter().filter_map(|(_, page)| page).collect())
    }

    /// Run a selector query through the caches.
    ///
    /// On a miss the selector goes to the driver for translation, missing
    /// pages are batch loaded, and the composed collection is cached under
    /// its canonical key (subject to the single-unpublished-result refusal).
    pub fn find(&self, selector: &str, options: &FindOptions) -> Result<PageCollection, StorageError> {
        let use_cache = options.cache && !options.lazy && self.query_cache_enabled();
        let key = selector_cache_key(selector, options, &self.locale());

        if use_cache {
            if let Some(hit) = self.cached_results(&key, selector) {
                debug!(key = %key, results = hit.len(), "Query cache hit");
                return Ok(hit);
            }
        }

        let ids = self.driver.find_ids(selector, options)?;
        let pages = self.get_by_ids(&ids, &LoadOptions::default())?;
        let results = PageCollection::from_pages(selector, pages);

        if use_cache {
            self.queries.store(&key, options, &results);
        }
        Ok(results)
    }

    /// First match for `selector`, if any.
    pub fn find_one(&self, selector: &str) -> Result<Option<SharedPage>, StorageError> {
        let results = self.find(selector, &FindOptions::one())?;
        Ok(results.first().cloned())
    }

    /// Ids only, wrapped in the chunked lazy iterator. The query cache is
    /// bypassed entirely.
    pub fn find_lazy(
        &self,
        selector: &str,
        options: &FindOptions,
    ) -> Result<LazyPages<'_>, StorageError> {
        let mut options = options.clone();
        options.lazy = true;
        let ids = self.driver.find_ids(selector, &options)?;
        let placeholders: Vec<PagePlaceholder> =
            ids.into_iter().map(PagePlaceholder::new).collect();
        Ok(LazyPages::new(self, placeholders))
    }

    /// Resolve a cached id list back into a fresh collection.
    ///
    /// Returns an independent collection over shared handles; mutating it
    /// never touches the cached entry. An id that is no longer resident
    /// invalidates the whole entry — coarse, like the rest of the
    /// invalidation story.
    fn cached_results(&self, key: &str, selector: &str) -> Option<PageCollection> {
        let ids = self.queries.lookup(key)?;
        let formatting = self.output_formatting();
        let mut results = PageCollection::new(selector);
        for id in ids {
            match self.identity.get(id) {
                Some(page) => {
                    rw_write(&page, SOURCE, "cached_results.refresh")
                        .set_output_formatting(formatting);
                    results.push(page);
                }
                None => {
                    self.queries.forget(key);
                    return None;
                }
            }
        }
        Some(results)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Persist a new or mutated page and return the canonical shared handle.
    ///
    /// Any write clears the whole query cache.
    pub fn save(&self, page: SharedPage) -> Result<SharedPage, StorageError> {
        let snapshot = rw_read(&page, SOURCE, "save.snapshot").clone();
        let id = self.driver.store_page(&snapshot)?;
        {
            let mut guard = rw_write(&page, SOURCE, "save.assign");
            guard.id = id;
            guard.mark_loaded();
        }
        let saved = rw_read(&page, SOURCE, "save.resnapshot").clone();
        self.sortfields.save(&saved)?;
        self.identity.put_shared(page.clone(), None);
        self.queries.clear();
        debug!(%id, "Page saved; query cache cleared");
        Ok(page)
    }

    /// Delete a page, its override row, and every cache trace of it.
    pub fn delete(&self, page: &SharedPage) -> Result<bool, StorageError> {
        let snapshot = rw_read(page, SOURCE, "delete.snapshot").clone();
        let existed = self.driver.delete_page(snapshot.id)?;
        self.sortfields.delete(&snapshot)?;
        self.identity.remove(snapshot.id, false);
        self.queries.clear();
        debug!(id = %snapshot.id, existed, "Page deleted; query cache cleared");
        Ok(existed)
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Evict one page from the identity cache.
    pub fn uncache(&self, page: &SharedPage, shallow: bool) -> bool {
        let id = rw_read(page, SOURCE, "uncache.id").id;
        self.identity.remove(id, shallow)
    }

    /// Evict an identity-cache group.
    pub fn uncache_group(&self, group: &str) -> usize {
        self.identity.remove_group(group)
    }

    /// Request-boundary reset: clears the loading stack and the query cache,
    /// then evicts every identity entry except pinned pages and pages with
    /// children loaded. Returns the count evicted. Never fails.
    pub fn uncache_all(&self) -> usize {
        rw_write(&self.loading, SOURCE, "uncache_all.loading").clear();
        self.queries.clear();
        let pins = CachePins {
            actor: *rw_read(&self.actor_page, SOURCE, "uncache_all.actor"),
            locale: *rw_read(&self.locale_page, SOURCE, "uncache_all.locale"),
        };
        self.identity.remove_all(pins)
    }

    // ========================================================================
    // Loading stack
    // ========================================================================

    fn is_loading(&self, id: PageId) -> bool {
        rw_read(&self.loading, SOURCE, "is_loading").contains(&id)
    }

    fn push_loading(&self, ids: &[PageId]) {
        rw_write(&self.loading, SOURCE, "push_loading").extend_from_slice(ids);
    }

    fn pop_loading(&self, count: usize) {
        let mut loading = rw_write(&self.loading, SOURCE, "pop_loading");
        let keep = loading.len().saturating_sub(count);
        loading.truncate(keep);
    }
}
