//! Page entities mirrored from persistent storage.
//!
//! Native attributes are typed struct fields; custom fields live in an
//! explicit name → [`Value`] map. Parent/child relations are id references
//! resolved through the identity cache, never owning pointers.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize, Serializer};
use time::OffsetDateTime;

use crate::cache::rw_read;
use crate::domain::values::Value;

const SOURCE: &str = "domain::pages";

/// Unique page identifier. Zero marks a page that has not been persisted yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PageId(pub u64);

impl PageId {
    /// Sentinel for pages that were never saved.
    pub const UNSAVED: PageId = PageId(0);
    /// Root of the page tree.
    pub const ROOT: PageId = PageId(1);

    pub fn is_unsaved(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upper bound of the status range; selectors spell "any status" as
/// `status<STATUS_MAX`.
pub const STATUS_MAX: u32 = 9_999_999;

bitflags::bitflags! {
    /// Page status bitmask persisted as a single integer column.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageStatus: u32 {
        const ON = 1;
        const LOCKED = 4;
        const SYSTEM_ID = 8;
        const SYSTEM = 16;
        const DRAFT = 64;
        const TEMP = 512;
        const HIDDEN = 1024;
        const UNPUBLISHED = 2048;
        const TRASH = 8192;
        const DELETED = 16384;
        const CORRUPTED = 131072;
    }
}

impl PageStatus {
    /// True when the page is unpublished or in a worse state (trashed,
    /// deleted, corrupted). Such pages are state-sensitive and single-result
    /// lookups for them must not be reused from the query cache.
    pub fn at_or_above_unpublished(self) -> bool {
        self.bits() >= Self::UNPUBLISHED.bits()
    }
}

impl Default for PageStatus {
    fn default() -> Self {
        Self::ON
    }
}

impl Serialize for PageStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

/// Shared handle to a cached page.
///
/// The identity cache owns the canonical instance; everything else clones the
/// handle, so a given id has at most one live representation per process.
pub type SharedPage = Arc<RwLock<Page>>;

/// A single page of the content tree.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: PageId,
    pub parent_id: PageId,
    pub name: String,
    pub template: String,
    pub status: PageStatus,
    /// Position among siblings under the default manual sort.
    pub sort: i64,
    /// Child-sort override in decoded form (e.g. `"-modified"`). `None`
    /// means the default manual sort.
    pub sortfield: Option<String>,
    pub created: OffsetDateTime,
    pub modified: OffsetDateTime,
    pub fields: BTreeMap<String, Value>,

    // Request-scoped runtime state, never persisted.
    #[serde(skip)]
    output_formatting: bool,
    #[serde(skip)]
    loaded: bool,
    #[serde(skip)]
    children: Option<Vec<PageId>>,
    #[serde(skip)]
    path: Option<String>,
}

impl Page {
    pub fn new(
        id: PageId,
        parent_id: PageId,
        name: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            parent_id,
            name: name.into(),
            template: template.into(),
            status: PageStatus::default(),
            sort: 0,
            sortfield: None,
            created: now,
            modified: now,
            fields: BTreeMap::new(),
            output_formatting: false,
            loaded: false,
            children: None,
            path: None,
        }
    }

    pub fn into_shared(self) -> SharedPage {
        Arc::new(RwLock::new(self))
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn output_formatting(&self) -> bool {
        self.output_formatting
    }

    pub fn set_output_formatting(&mut self, on: bool) {
        self.output_formatting = on;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Lifecycle hook invoked by the identity cache when the page enters it.
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    pub fn has_children_loaded(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> Option<&[PageId]> {
        self.children.as_deref()
    }

    pub fn attach_children(&mut self, children: Vec<PageId>) {
        self.children = Some(children);
    }

    /// Memoized tree path, when one has been computed this request.
    pub fn path_hint(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn memoize_path(&mut self, path: impl Into<String>) {
        self.path = Some(path.into());
    }

    /// Lifecycle hook invoked by the identity cache on deep eviction: drops
    /// request-scoped memoized state so nothing dangles past the entry.
    pub fn release_caches(&mut self) {
        self.path = None;
        self.children = None;
    }
}

/// Lightweight stand-in for a page that has not been materialized yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagePlaceholder {
    pub id: PageId,
    pub parent_id: Option<PageId>,
    pub template: Option<String>,
}

impl PagePlaceholder {
    pub fn new(id: PageId) -> Self {
        Self {
            id,
            parent_id: None,
            template: None,
        }
    }
}

impl From<PageId> for PagePlaceholder {
    fn from(id: PageId) -> Self {
        Self::new(id)
    }
}

/// Ordered collection of shared page handles, tagged with the selector that
/// produced it.
///
/// Cloning yields an independent ordered view over the same shared handles;
/// mutating a clone never affects the original.
#[derive(Debug, Clone, Default)]
pub struct PageCollection {
    selector: String,
    pages: Vec<SharedPage>,
}

impl PageCollection {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            pages: Vec::new(),
        }
    }

    pub fn from_pages(selector: impl Into<String>, pages: Vec<SharedPage>) -> Self {
        Self {
            selector: selector.into(),
            pages,
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn push(&mut self, page: SharedPage) {
        self.pages.push(page);
    }

    pub fn first(&self) -> Option<&SharedPage> {
        self.pages.first()
    }

    pub fn get(&self, index: usize) -> Option<&SharedPage> {
        self.pages.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SharedPage> {
        self.pages.iter()
    }

    /// Ids in collection order.
    pub fn ids(&self) -> Vec<PageId> {
        self.pages
            .iter()
            .map(|page| rw_read(page, SOURCE, "ids").id)
            .collect()
    }
}

impl IntoIterator for PageCollection {
    type Item = SharedPage;
    type IntoIter = std::vec::IntoIter<SharedPage>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.into_iter()
    }
}

impl<'a> IntoIterator for &'a PageCollection {
    type Item = &'a SharedPage;
    type IntoIter = std::slice::Iter<'a, SharedPage>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}
