//! In-memory storage driver.
//!
//! Backs the test suite and embedders that do not bring an external backend.
//! Selector support is deliberately small: comma-separated clauses combined
//! with AND, `=` on native columns and text custom fields, `<` on numeric
//! columns, and `|` alternation for ids.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::cache::{rw_read, rw_write};
use crate::domain::{Page, PageId, Value};

use super::driver::{FindOptions, StorageDriver};
use super::error::StorageError;
use super::sortfield::SortToken;

const SOURCE: &str = "store::memory";

enum Op {
    Eq,
    Lt,
}

struct Clause {
    key: String,
    op: Op,
    value: String,
}

impl Clause {
    fn matches(&self, page: &Page) -> bool {
        match self.op {
            Op::Eq => self.matches_eq(page),
            Op::Lt => self.matches_lt(page),
        }
    }

    fn matches_eq(&self, page: &Page) -> bool {
        let value = self.value.as_str();
        match self.key.as_str() {
            "id" => value
                .split('|')
                .any(|alt| alt.parse::<u64>().is_ok_and(|n| PageId(n) == page.id)),
            "parent_id" => value
                .parse::<u64>()
                .is_ok_and(|n| PageId(n) == page.parent_id),
            "name" => page.name == value,
            "template" => page.template == value,
            // Only the root path resolves without a tree walk.
            "path" => value == "/" && page.id == PageId::ROOT,
            "status" => value.parse::<u32>().is_ok_and(|bits| page.status.bits() == bits),
            _ => page.field(&self.key).and_then(Value::as_text) == Some(value),
        }
    }

    fn matches_lt(&self, page: &Page) -> bool {
        match self.key.as_str() {
            "status" => self
                .value
                .parse::<u32>()
                .is_ok_and(|bound| page.status.bits() < bound),
            "id" => self.value.parse::<u64>().is_ok_and(|bound| page.id.0 < bound),
            _ => false,
        }
    }
}

fn parse_selector(selector: &str) -> Result<Vec<Clause>, StorageError> {
    let mut clauses = Vec::new();
    for raw in selector.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let (key, op, value) = if let Some((key, value)) = raw.split_once('=') {
            (key, Op::Eq, value)
        } else if let Some((key, value)) = raw.split_once('<') {
            (key, Op::Lt, value)
        } else {
            return Err(StorageError::query(
                selector,
                format!("unsupported clause `{raw}`"),
            ));
        };
        clauses.push(Clause {
            key: key.trim().to_string(),
            op,
            value: value.trim().to_string(),
        });
    }
    Ok(clauses)
}

fn sort_matched(pages: &mut Vec<&Page>, sort: Option<&str>) {
    let (descending, field) = match sort {
        Some(expr) => match expr.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, expr),
        },
        None => (false, "sort"),
    };
    pages.sort_by(|a, b| {
        let ordering = match field {
            "name" => a.name.cmp(&b.name),
            "id" => a.id.cmp(&b.id),
            "created" => a.created.cmp(&b.created),
            "modified" => a.modified.cmp(&b.modified),
            _ => a.sort.cmp(&b.sort),
        };
        ordering.then(a.id.cmp(&b.id))
    });
    if descending {
        pages.reverse();
    }
}

/// BTreeMap-backed [`StorageDriver`].
pub struct MemoryDriver {
    pages: RwLock<BTreeMap<PageId, Page>>,
    sortfields: RwLock<BTreeMap<PageId, SortToken>>,
    next_id: AtomicU64,
    failing: AtomicBool,
    recorded_queries: RwLock<Vec<String>>,
    recorded_batches: RwLock<Vec<Vec<PageId>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(BTreeMap::new()),
            sortfields: RwLock::new(BTreeMap::new()),
            // Id 1 is reserved for the tree root.
            next_id: AtomicU64::new(2),
            failing: AtomicBool::new(false),
            recorded_queries: RwLock::new(Vec::new()),
            recorded_batches: RwLock::new(Vec::new()),
        }
    }

    /// Seed a page directly, assigning an id when unsaved. Returns the id.
    pub fn seed(&self, page: Page) -> PageId {
        self.insert(page)
    }

    /// Simulate a backend outage: subsequent queries and loads fail until
    /// reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Selectors observed by `find_ids`, in call order.
    pub fn recorded_queries(&self) -> Vec<String> {
        rw_read(&self.recorded_queries, SOURCE, "recorded_queries").clone()
    }

    /// Id batches observed by `load_by_ids`, in call order.
    pub fn recorded_batches(&self) -> Vec<Vec<PageId>> {
        rw_read(&self.recorded_batches, SOURCE, "recorded_batches").clone()
    }

    pub fn page_count(&self) -> usize {
        rw_read(&self.pages, SOURCE, "page_count").len()
    }

    fn insert(&self, mut page: Page) -> PageId {
        if page.id.is_unsaved() {
            page.id = PageId(self.next_id.fetch_add(1, Ordering::Relaxed));
        } else {
            // Keep the allocator ahead of explicitly chosen ids.
            self.next_id.fetch_max(page.id.0 + 1, Ordering::Relaxed);
        }
        let id = page.id;
        rw_write(&self.pages, SOURCE, "insert").insert(id, page);
        id
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageDriver for MemoryDriver {
    fn find_ids(
        &self,
        selector: &str,
        options: &FindOptions,
    ) -> Result<Vec<PageId>, StorageError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(StorageError::query(selector, "simulated backend failure"));
        }
        rw_write(&self.recorded_queries, SOURCE, "find_ids.record").push(selector.to_string());

        let clauses = parse_selector(selector)?;
        let pages = rw_read(&self.pages, SOURCE, "find_ids");
        let mut matched: Vec<&Page> = pages
            .values()
            .filter(|page| clauses.iter().all(|clause| clause.matches(page)))
            .collect();
        sort_matched(&mut matched, options.sort.as_deref());

        let start = options.start.unwrap_or(0) as usize;
        let mut ids: Vec<PageId> = matched.into_iter().skip(start).map(|page| page.id).collect();
        if let Some(limit) = options.limit {
            ids.truncate(limit as usize);
        }
        Ok(ids)
    }

    fn load_by_ids(&self, ids: &[PageId]) -> Result<Vec<Page>, StorageError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(StorageError::from_persistence("simulated backend failure"));
        }
        rw_write(&self.recorded_batches, SOURCE, "load_by_ids.record").push(ids.to_vec());

        let pages = rw_read(&self.pages, SOURCE, "load_by_ids");
        Ok(ids.iter().filter_map(|id| pages.get(id).cloned()).collect())
    }

    fn store_page(&self, page: &Page) -> Result<PageId, StorageError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(StorageError::from_persistence("simulated backend failure"));
        }
        Ok(self.insert(page.clone()))
    }

    fn delete_page(&self, id: PageId) -> Result<bool, StorageError> {
        Ok(rw_write(&self.pages, SOURCE, "delete_page").remove(&id).is_some())
    }

    fn sortfield_of(&self, parent: PageId) -> Result<Option<SortToken>, StorageError> {
        Ok(rw_read(&self.sortfields, SOURCE, "sortfield_of")
            .get(&parent)
            .cloned())
    }

    fn save_sortfield(&self, parent: PageId, token: &SortToken) -> Result<(), StorageError> {
        rw_write(&self.sortfields, SOURCE, "save_sortfield").insert(parent, token.clone());
        Ok(())
    }

    fn delete_sortfield(&self, parent: PageId) -> Result<bool, StorageError> {
        Ok(rw_write(&self.sortfields, SOURCE, "delete_sortfield")
            .remove(&parent)
            .is_some())
    }
}
