//! Configuration layer: typed settings with layered precedence (file → env).

use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::store::LocaleContext;

const ENV_PREFIX: &str = "ARBORA";
const DEFAULT_QUERY_CACHE_LIMIT: usize = 500;
const DEFAULT_CHUNK_SIZE: usize = 250;
const DEFAULT_LOCALE_ID: u32 = 0;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

/// Top-level settings for an embedding application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub cache: CacheSettings,
    pub locale: LocaleSettings,
}

/// Cache and lazy-loading knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Enable the selector-keyed query result cache.
    pub enable_query_cache: bool,
    /// Maximum cached query results before LRU eviction.
    pub query_cache_limit: usize,
    /// Pages materialized per chunk during lazy iteration.
    pub chunk_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enable_query_cache: true,
            query_cache_limit: DEFAULT_QUERY_CACHE_LIMIT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Locale discrimination for cache keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocaleSettings {
    /// Numeric id of the default locale.
    pub default_locale_id: u32,
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self {
            default_locale_id: DEFAULT_LOCALE_ID,
        }
    }
}

impl StoreSettings {
    /// Load settings from an optional TOML file, then the `ARBORA__…`
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Locale context for `active`, marked default when it matches the
    /// configured default locale.
    pub fn locale_context(&self, active: u32) -> LocaleContext {
        LocaleContext::new(active, active == self.locale.default_locale_id)
    }
}
