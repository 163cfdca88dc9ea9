//! Selector cache keys.
//!
//! Canonicalizes a (selector, options) pair into the string key used by the
//! query result cache. Two queries that can only resolve to the same result
//! set must map to the same key, no matter how their options were assembled.

use serde_json::Value as JsonValue;

use crate::domain::STATUS_MAX;
use crate::store::{FindOptions, LocaleContext};

/// Well-known equivalent selector spellings, collapsed to one canonical form.
const EQUIVALENT_FORMS: &[(&str, &str)] = &[
    ("path=/,", "id=1,"),
    ("parent=/,", "parent_id=1,"),
];

/// Canonical cache key for a selector query.
///
/// Pure and deterministic: typed options serialize in a fixed order, extras
/// in key order, nested values recursively with sorted object keys. Single
/// result lookups shed the status-range and pagination clauses that cannot
/// change their identity, and a non-default locale appends a discriminator so
/// results never leak across locales.
pub fn selector_cache_key(selector: &str, options: &FindOptions, locale: &LocaleContext) -> String {
    let mut key = format!("{selector},{}", canonical_options(options));
    for (from, to) in EQUIVALENT_FORMS {
        if key.contains(from) {
            key = key.replace(from, to);
        }
    }
    if options.find_one {
        key = strip_find_one_noise(&key);
    }
    if !locale.is_default() {
        key.push_str(&format!(",locale={}", locale.id()));
    }
    key
}

fn canonical_options(options: &FindOptions) -> String {
    let mut parts = vec![
        format!("cache={}", u8::from(options.cache)),
        format!("findOne={}", u8::from(options.find_one)),
        format!("lazy={}", u8::from(options.lazy)),
    ];
    if let Some(limit) = options.limit {
        parts.push(format!("limit={limit}"));
    }
    if let Some(sort) = &options.sort {
        parts.push(format!("sort={sort}"));
    }
    if let Some(start) = options.start {
        parts.push(format!("start={start}"));
    }
    for (name, value) in &options.extras {
        parts.push(format!("{name}={}", canonical_json(value)));
    }
    parts.join(",")
}

/// Recursive stringification with sorted object keys, so map-valued options
/// canonicalize independently of insertion order.
fn canonical_json(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".to_string(),
        JsonValue::Bool(flag) => flag.to_string(),
        JsonValue::Number(number) => number.to_string(),
        JsonValue::String(text) => text.clone(),
        JsonValue::Array(items) => {
            let inner: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", inner.join("|"))
        }
        JsonValue::Object(map) => {
            let mut pairs: Vec<(&String, &JsonValue)> = map.iter().collect();
            pairs.sort_by_key(|(key, _)| *key);
            let inner: Vec<String> = pairs
                .iter()
                .map(|(key, value)| format!("{key}:{}", canonical_json(value)))
                .collect();
            format!("{{{}}}", inner.join("|"))
        }
    }
}

/// Once defaults are assumed, a single-result lookup is identified by its
/// selector alone: drop the status-range and pagination clauses and trim the
/// separators they leave behind.
fn strip_find_one_noise(key: &str) -> String {
    let status_any = format!("status<{STATUS_MAX}");
    key.split(',')
        .map(str::trim)
        .filter(|clause| {
            !clause.is_empty()
                && *clause != status_any.as_str()
                && *clause != "limit=1"
                && *clause != "start=0"
        })
        .collect::<Vec<_>>()
        .join(",")
}
