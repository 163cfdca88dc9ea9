//! Arbora cache subsystem.
//!
//! Two cooperating stores back every selector query:
//!
//! - **Identity cache**: at most one live page instance per id
//! - **Query cache**: canonical selector key → the ordered ids it resolved to
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `arbora.toml`:
//!
//! ```toml
//! [cache]
//! enable_query_cache = true
//! query_cache_limit = 500
//! chunk_size = 250
//! ```

mod config;
mod identity;
mod keys;
mod lock;
mod results;

pub use config::CacheConfig;
pub use identity::{CachePins, IdentityCache};
pub use keys::selector_cache_key;
pub use results::QueryCache;

pub(crate) use lock::{rw_read, rw_write};
