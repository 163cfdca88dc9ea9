//! Field registry: native page columns and custom field definitions.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Numeric identifier of a custom field definition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FieldId(pub u32);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Native page columns that sort expressions may reference directly.
static NATIVE_FIELDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "id",
        "parent_id",
        "name",
        "template",
        "status",
        "sort",
        "created",
        "modified",
    ]
    .into_iter()
    .collect()
});

/// True when `name` is a native page column rather than a custom field.
pub fn is_native_field(name: &str) -> bool {
    NATIVE_FIELDS.contains(name)
}

/// Name ↔ id lookup for custom field definitions.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    by_name: BTreeMap<String, FieldId>,
    by_id: BTreeMap<FieldId, String>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom field definition.
    ///
    /// Names shadowing a native column, and names or ids already registered
    /// under a different pairing, are rejected.
    pub fn register(&mut self, id: FieldId, name: impl Into<String>) -> Result<(), DomainError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::validation("field name must not be empty"));
        }
        if is_native_field(&name) {
            return Err(DomainError::validation(format!(
                "field name `{name}` shadows a native column"
            )));
        }
        if self.by_name.get(&name).is_some_and(|existing| *existing != id)
            || self.by_id.get(&id).is_some_and(|existing| *existing != name)
        {
            return Err(DomainError::validation(format!(
                "field `{name}` ({id}) conflicts with an existing registration"
            )));
        }
        self.by_name.insert(name.clone(), id);
        self.by_id.insert(id, name);
        Ok(())
    }

    pub fn id_of(&self, name: &str) -> Option<FieldId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: FieldId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
