//! Arbora: an embeddable page-tree content store core.
//!
//! Arbora is the query and caching layer of a CMS-style page store. It does
//! not ship a storage backend of its own — translation of selectors into
//! backend queries happens behind the [`StorageDriver`] trait — and it has no
//! network or file-format surface. What it provides:
//!
//! - **Identity cache**: at most one live [`Page`] instance per id
//! - **Query cache**: canonical selector keys mapped to ordered result ids,
//!   cleared wholesale on any write
//! - **Chunked lazy loading**: bounded-memory iteration over large result
//!   sets via [`LazyPages`]
//! - **Sortfield codec**: compact per-parent child-sort overrides
//!
//! Everything hangs off a [`StoreSession`], the explicit per-request context:
//!
//! ```
//! use std::sync::Arc;
//!
//! use arbora::{
//!     CacheConfig, FieldRegistry, FindOptions, MemoryDriver, Page, PageId, StoreSession,
//! };
//!
//! let driver = Arc::new(MemoryDriver::new());
//! driver.seed(Page::new(PageId::ROOT, PageId::UNSAVED, "home", "home"));
//! driver.seed(Page::new(PageId(2), PageId::ROOT, "about", "basic"));
//!
//! let session = StoreSession::new(driver, FieldRegistry::new(), CacheConfig::default());
//! let results = session.find("template=basic", &FindOptions::default())?;
//! assert_eq!(results.len(), 1);
//! # Ok::<(), arbora::StorageError>(())
//! ```
//!
//! Embedders with an `arbora.toml` or `ARBORA__…` environment build the
//! session from loaded settings instead:
//!
//! ```
//! use std::sync::Arc;
//!
//! use arbora::{FieldRegistry, MemoryDriver, StoreSession, StoreSettings};
//!
//! let settings = StoreSettings::load(None)?;
//! let session = StoreSession::from_settings(
//!     Arc::new(MemoryDriver::new()),
//!     FieldRegistry::new(),
//!     &settings,
//! );
//! assert!(session.config().enable_query_cache);
//! # Ok::<(), arbora::SettingsError>(())
//! ```

pub mod cache;
pub mod config;
pub mod domain;
pub mod store;

pub use cache::{CacheConfig, CachePins, IdentityCache, QueryCache, selector_cache_key};
pub use config::{CacheSettings, LocaleSettings, SettingsError, StoreSettings};
pub use domain::{
    DomainError, FieldId, FieldRegistry, Page, PageCollection, PageId, PagePlaceholder,
    PageStatus, STATUS_MAX, SharedPage, Value, is_native_field,
};
pub use store::{
    DEFAULT_SORTFIELD, FindOptions, LazyPages, LoadOptions, LocaleContext, MemoryDriver,
    SortToken, Sortfields, StorageDriver, StorageError, StoreSession,
};
