//! Custom-field value model.
//!
//! A closed sum type stands in for the dynamic property bags of classic CMS
//! cores: every custom field resolves to exactly one of these variants, and
//! callers match or use the typed accessors instead of runtime reflection.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::pages::PageId;

/// A single custom-field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Time(OffsetDateTime),
    /// Reference to another page, resolved through the identity cache.
    Ref(PageId),
    List(Vec<Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Integer values coerce losslessly.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<PageId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Time(_) => "time",
            Self::Ref(_) => "ref",
            Self::List(_) => "list",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<PageId> for Value {
    fn from(value: PageId) -> Self {
        Self::Ref(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_match_variants() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(7_i64).as_int(), Some(7));
        assert_eq!(Value::from("hello").as_text(), Some("hello"));
        assert_eq!(Value::from(PageId(3)).as_ref_id(), Some(PageId(3)));
        assert_eq!(Value::from("hello").as_int(), None);
    }

    #[test]
    fn ints_coerce_to_float() {
        assert_eq!(Value::Int(2).as_float(), Some(2.0));
        assert_eq!(Value::Float(2.5).as_float(), Some(2.5));
        assert_eq!(Value::Bool(true).as_float(), None);
    }

    #[test]
    fn lists_nest() {
        let value = Value::List(vec![Value::Int(1), Value::List(vec![Value::Int(2)])]);
        let items = value.as_list().expect("list");
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_list().map(<[Value]>::len), Some(1));
    }
}
