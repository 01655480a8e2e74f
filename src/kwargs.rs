//! Keyword mappings passed to models and CRUD functions.
//!
//! Keys keep insertion order, so "first id key" is well defined.

use crate::error::CrudError;
use serde_json::{Map, Value};

/// Attribute or keyword mapping. Insertion ordered (`serde_json/preserve_order`).
pub type Attrs = Map<String, Value>;

/// Default `get` limit when the caller does not pass one.
pub const DEFAULT_LIMIT: usize = 1;

/// Limit used when the caller passes an explicit null.
pub const NULL_LIMIT: usize = 100;

/// Key that carries the result limit for `get`.
pub const LIMIT_KEY: &str = "limit";

/// True for values treated as "not supplied": null and the literal string `"null"`.
pub fn is_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s == "null",
        _ => false,
    }
}

/// Remove entries whose value is null or `"null"`. Remaining keys keep their order.
pub fn del_nulls(mut kwargs: Attrs) -> Attrs {
    kwargs.retain(|_, v| !is_null(v));
    kwargs
}

/// Keys that name an identifier (contain `id`, case-sensitive), in order.
pub fn parse_id(kwargs: &Attrs) -> impl Iterator<Item = &str> {
    kwargs.keys().map(String::as_str).filter(|k| k.contains("id"))
}

/// Keys that do not contain `id`, in order.
pub fn parse_not_id(kwargs: &Attrs) -> impl Iterator<Item = &str> {
    kwargs.keys().map(String::as_str).filter(|k| !k.contains("id"))
}

/// First id key, or a shape error naming the keys that were supplied.
pub fn require_id_key(kwargs: &Attrs) -> Result<&str, CrudError> {
    parse_id(kwargs)
        .next()
        .ok_or_else(|| CrudError::shape(format!("could not parse id key: {}", key_list(kwargs))))
}

/// Interpret a `limit` value: absent is [`DEFAULT_LIMIT`], null is [`NULL_LIMIT`].
/// Accepts non-negative integers and their decimal string form (query strings).
pub fn parse_limit(value: Option<&Value>) -> Result<usize, CrudError> {
    let Some(value) = value else {
        return Ok(DEFAULT_LIMIT);
    };
    match value {
        v if is_null(v) => Ok(NULL_LIMIT),
        Value::Number(n) => n
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| CrudError::shape(format!("limit must be a non-negative integer, got {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<usize>()
            .map_err(|_| CrudError::shape(format!("limit must be a non-negative integer, got '{}'", s))),
        other => Err(CrudError::shape(format!(
            "limit must be a non-negative integer, got {}",
            other
        ))),
    }
}

/// Text used to compare a criterion against a stored value. Strings compare by
/// content, other scalars by their JSON rendering, null by absence.
pub fn criterion_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn key_list(kwargs: &Attrs) -> String {
    format!("[{}]", kwargs.keys().cloned().collect::<Vec<_>>().join(", "))
}
