//! Cache configuration.
//!
//! Controls the query result cache and chunked lazy loading via `arbora.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_QUERY_CACHE_LIMIT: usize = 500;
const DEFAULT_CHUNK_SIZE: usize = 250;

/// Cache configuration from `arbora.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the selector-keyed query result cache.
    pub enable_query_cache: bool,
    /// Maximum cached query results before LRU eviction.
    ///
    /// Entries have no TTL; they live until a write clears them or capacity
    /// pushes them out.
    pub query_cache_limit: usize,
    /// Pages materialized per chunk during lazy iteration. Read fresh on
    /// every chunk load, so runtime changes affect future chunk boundaries.
    pub chunk_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_query_cache: true,
            query_cache_limit: DEFAULT_QUERY_CACHE_LIMIT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enable_query_cache: settings.enable_query_cache,
            query_cache_limit: settings.query_cache_limit,
            chunk_size: settings.chunk_size,
        }
    }
}

impl CacheConfig {
    /// Returns the query cache limit as NonZeroUsize, clamping to 1 if zero.
    pub fn query_cache_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.query_cache_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the chunk size as NonZeroUsize, clamping to 1 if zero.
    pub fn chunk_size_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.chunk_size).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enable_query_cache);
        assert_eq!(config.query_cache_limit, 500);
        assert_eq!(config.chunk_size, 250);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            query_cache_limit: 0,
            chunk_size: 0,
            ..Default::default()
        };
        assert_eq!(config.query_cache_limit_non_zero().get(), 1);
        assert_eq!(config.chunk_size_non_zero().get(), 1);
    }

    #[test]
    fn settings_bridge_copies_all_knobs() {
        let settings = crate::config::CacheSettings {
            enable_query_cache: false,
            query_cache_limit: 7,
            chunk_size: 3,
        };
        let config = CacheConfig::from(&settings);
        assert!(!config.enable_query_cache);
        assert_eq!(config.query_cache_limit, 7);
        assert_eq!(config.chunk_size, 3);
    }
}
