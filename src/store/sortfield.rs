//! Sort-field codec and per-parent override persistence.
//!
//! A page's children order can be overridden per parent. The persisted form
//! is compact: a native column name, or the numeric id of a custom field,
//! with a leading dash for descending order. Only non-default sorts occupy a
//! row in the override table.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{FieldId, FieldRegistry, Page, PageId, is_native_field};

use super::driver::StorageDriver;
use super::error::StorageError;

/// Child sort applied when no override row exists.
pub const DEFAULT_SORTFIELD: &str = "sort";

/// Compact persisted sort reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortToken {
    /// Numeric custom-field id; negative for descending.
    Id(i64),
    /// Native column name; `-` prefix for descending.
    Name(String),
}

impl fmt::Display for SortToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for SortToken {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let body = raw.strip_prefix('-').unwrap_or(raw);
        if !body.is_empty() && body.bytes().all(|byte| byte.is_ascii_digit()) {
            if let Ok(id) = raw.parse::<i64>() {
                return Ok(Self::Id(id));
            }
        }
        Ok(Self::Name(raw.to_string()))
    }
}

/// Encodes, decodes and persists per-parent sort overrides.
pub struct Sortfields {
    driver: Arc<dyn StorageDriver>,
    fields: Arc<FieldRegistry>,
}

impl Sortfields {
    pub fn new(driver: Arc<dyn StorageDriver>, fields: Arc<FieldRegistry>) -> Self {
        Self { driver, fields }
    }

    /// Decoded field name for a raw token.
    ///
    /// Unresolvable tokens degrade to `default`, unsigned — ordering is a
    /// display concern, not a correctness-critical one.
    pub fn decode(&self, raw: &SortToken, default: &str) -> String {
        let (descending, body) = match raw {
            SortToken::Id(id) => (*id < 0, id.unsigned_abs().to_string()),
            SortToken::Name(name) => match name.strip_prefix('-') {
                Some(rest) => (true, rest.to_string()),
                None => (false, name.clone()),
            },
        };

        let numeric = !body.is_empty() && body.bytes().all(|byte| byte.is_ascii_digit());
        let name = if numeric {
            body.parse::<u32>()
                .ok()
                .and_then(|id| self.fields.name_of(FieldId(id)))
                .map(str::to_string)
                .unwrap_or_default()
        } else if is_native_field(&body) {
            body
        } else if self.fields.id_of(&body).is_some() {
            body
        } else {
            String::new()
        };

        if name.is_empty() {
            return default.to_string();
        }
        if descending { format!("-{name}") } else { name }
    }

    /// Compact token for a decoded field name.
    ///
    /// Non-native names resolve to their numeric field id; unresolvable
    /// names degrade to `default`, unsigned.
    pub fn encode(&self, field: &str, default: &str) -> SortToken {
        let (descending, body) = match field.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, field),
        };
        if body.is_empty() {
            return SortToken::Name(default.to_string());
        }
        if is_native_field(body) {
            let name = if descending {
                format!("-{body}")
            } else {
                body.to_string()
            };
            return SortToken::Name(name);
        }
        match self.fields.id_of(body) {
            Some(FieldId(id)) => {
                let signed = i64::from(id);
                SortToken::Id(if descending { -signed } else { signed })
            }
            None => SortToken::Name(default.to_string()),
        }
    }

    /// Decoded sort override for `parent`'s children; the default when no
    /// row exists.
    pub fn sortfield_of(&self, parent: PageId) -> Result<String, StorageError> {
        Ok(match self.driver.sortfield_of(parent)? {
            Some(token) => self.decode(&token, DEFAULT_SORTFIELD),
            None => DEFAULT_SORTFIELD.to_string(),
        })
    }

    /// Persist `page`'s child-sort override.
    ///
    /// A no-op when the stored value already matches. A value resolving to
    /// the bare default deletes any existing row instead of writing one, so
    /// only pages with a non-default sort occupy the override table.
    pub fn save(&self, page: &Page) -> Result<bool, StorageError> {
        let desired = page.sortfield.as_deref().unwrap_or(DEFAULT_SORTFIELD);
        let token = self.encode(desired, DEFAULT_SORTFIELD);
        let decoded = self.decode(&token, DEFAULT_SORTFIELD);

        let current = self.sortfield_of(page.id)?;
        if decoded == current {
            return Ok(true);
        }
        if decoded == DEFAULT_SORTFIELD {
            self.driver.delete_sortfield(page.id)?;
            return Ok(true);
        }
        self.driver.save_sortfield(page.id, &token)?;
        Ok(true)
    }

    /// Drop `page`'s override row. Returns whether one existed.
    pub fn delete(&self, page: &Page) -> Result<bool, StorageError> {
        self.driver.delete_sortfield(page.id)
    }
}
