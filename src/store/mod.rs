//! Store layer: the session context, the storage driver boundary, chunked
//! lazy loading, and sort-override persistence.

mod driver;
mod error;
mod lazy;
mod memory;
mod session;
mod sortfield;

pub use driver::{FindOptions, LoadOptions, StorageDriver};
pub use error::StorageError;
pub use lazy::LazyPages;
pub use memory::MemoryDriver;
pub use session::{LocaleContext, StoreSession};
pub use sortfield::{DEFAULT_SORTFIELD, SortToken, Sortfields};
