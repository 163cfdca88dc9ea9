//! Chunked lazy iteration over large result sets.
//!
//! A lazy find holds only lightweight placeholders up front and materializes
//! pages in fixed-size windows during iteration, so peak memory stays bounded
//! by one chunk regardless of the total result size.

use tracing::debug;

use crate::domain::{PageId, PagePlaceholder, SharedPage};

use super::driver::LoadOptions;
use super::error::StorageError;
use super::session::StoreSession;

/// Identity-cache group tagging lazily loaded chunks. Evicted before every
/// chunk load, so a lazy pass never grows the identity cache beyond one
/// window and never pollutes the query cache.
pub(crate) const LAZY_CHUNK_GROUP: &str = "lazy-chunk";

/// Restartable forward-only iterator over an ordered placeholder list.
///
/// Single-consumer, single-pass; restart via [`LazyPages::rewind`] only. A
/// failed chunk load yields the error once and ends the iteration rather
/// than silently truncating the sequence.
pub struct LazyPages<'a> {
    session: &'a StoreSession,
    placeholders: Vec<PagePlaceholder>,
    chunk_index: usize,
    pos: usize,
    chunk: Vec<SharedPage>,
    finished: bool,
    failed: bool,
}

impl<'a> LazyPages<'a> {
    pub(crate) fn new(session: &'a StoreSession, placeholders: Vec<PagePlaceholder>) -> Self {
        Self {
            session,
            placeholders,
            chunk_index: 0,
            pos: 0,
            chunk: Vec::new(),
            finished: false,
            failed: false,
        }
    }

    /// Total number of placeholders established for this iteration.
    pub fn len(&self) -> usize {
        self.placeholders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Restart from the first chunk. The placeholder list is reused.
    pub fn rewind(&mut self) {
        self.chunk_index = 0;
        self.pos = 0;
        self.chunk.clear();
        self.finished = false;
        self.failed = false;
    }

    fn load_chunk(&mut self) -> Result<(), StorageError> {
        // Read fresh on every load: runtime reconfiguration moves future
        // chunk boundaries only.
        let chunk_size = self.session.chunk_size().get();
        self.session.uncache_group(LAZY_CHUNK_GROUP);
        self.chunk.clear();
        self.pos = 0;

        let start = self.chunk_index.saturating_mul(chunk_size);
        if start >= self.placeholders.len() {
            self.finished = true;
            return Ok(());
        }

        let end = (start + chunk_size).min(self.placeholders.len());
        let ids: Vec<PageId> = self.placeholders[start..end]
            .iter()
            .map(|placeholder| placeholder.id)
            .collect();
        let options = LoadOptions {
            cache: true,
            cache_group: Some(LAZY_CHUNK_GROUP.to_string()),
        };
        let pages = self.session.get_by_ids(&ids, &options)?;
        debug!(
            chunk = self.chunk_index,
            requested = ids.len(),
            loaded = pages.len(),
            "Lazy chunk loaded"
        );

        self.chunk = pages;
        self.chunk_index += 1;
        if self.chunk.is_empty() {
            self.finished = true;
        }
        Ok(())
    }
}

impl Iterator for LazyPages<'_> {
    type Item = Result<SharedPage, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while self.pos >= self.chunk.len() {
            if self.finished {
                return None;
            }
            if let Err(err) = self.load_chunk() {
                self.failed = true;
                return Some(Err(err));
            }
        }
        let page = self.chunk[self.pos].clone();
        self.pos += 1;
        Some(Ok(page))
    }
}
