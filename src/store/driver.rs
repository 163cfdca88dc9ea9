//! Storage driver boundary.
//!
//! The selector-to-storage translator is a black box behind this trait:
//! given a selector and options it returns the ordered ids it matches, or
//! fully loaded pages for an id batch. The session wraps every call with its
//! caches; drivers stay oblivious to them.

use std::collections::BTreeMap;

use crate::domain::{Page, PageId};

use super::error::StorageError;
use super::sortfield::SortToken;

/// Options accompanying a selector query.
///
/// Two queries are equivalent iff their selector and canonical option forms
/// match; see [`crate::cache::selector_cache_key`].
#[derive(Debug, Clone, PartialEq)]
pub struct FindOptions {
    /// Return at most the first match; pagination defaults are shed from the
    /// cache key.
    pub find_one: bool,
    /// Defer materialization to chunked lazy iteration.
    pub lazy: bool,
    /// Consult and populate the query result cache.
    pub cache: bool,
    pub start: Option<u64>,
    pub limit: Option<u64>,
    /// Sort expression in decoded form (`"name"`, `"-modified"`).
    pub sort: Option<String>,
    /// Free-form options folded into the cache key.
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            find_one: false,
            lazy: false,
            cache: true,
            start: None,
            limit: None,
            sort: None,
            extras: BTreeMap::new(),
        }
    }
}

impl FindOptions {
    /// Options for a single-result lookup.
    pub fn one() -> Self {
        Self {
            find_one: true,
            limit: Some(1),
            ..Self::default()
        }
    }
}

/// Options for a batch load through the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Register loaded pages in the identity cache.
    pub cache: bool,
    /// Tag loaded pages with a named identity-cache group, evictable as one.
    pub cache_group: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            cache: true,
            cache_group: None,
        }
    }
}

/// Pluggable storage backend.
pub trait StorageDriver: Send + Sync {
    /// Translate a selector into the ordered ids it matches.
    fn find_ids(&self, selector: &str, options: &FindOptions)
    -> Result<Vec<PageId>, StorageError>;

    /// Load full pages for `ids`, preserving input order. Unknown ids are
    /// skipped, not errors.
    fn load_by_ids(&self, ids: &[PageId]) -> Result<Vec<Page>, StorageError>;

    /// Insert or update a page; returns the persisted id.
    fn store_page(&self, page: &Page) -> Result<PageId, StorageError>;

    /// Delete a page; returns whether it existed.
    fn delete_page(&self, id: PageId) -> Result<bool, StorageError>;

    /// Raw child-sort override for `parent`, if a row exists.
    fn sortfield_of(&self, parent: PageId) -> Result<Option<SortToken>, StorageError>;

    fn save_sortfield(&self, parent: PageId, token: &SortToken) -> Result<(), StorageError>;

    /// Returns whether a row existed.
    fn delete_sortfield(&self, parent: PageId) -> Result<bool, StorageError>;
}
