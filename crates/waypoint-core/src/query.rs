//! JSON-valued query string codec.
//!
//! Query values are JSON values. A string is written verbatim unless it would
//! itself parse as JSON (e.g. `"42"` or `"true"`), in which case it is quoted
//! so that it decodes back to a string.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

/// Parsed query parameters, keyed by name.
pub type Query = serde_json::Map<String, Value>;

/// Characters left unescaped in a URL component.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a single path or query component.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Percent-decode a single path or query component.
pub fn decode_component(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            if serde_json::from_str::<Value>(s).is_ok() {
                Value::String(s.clone()).to_string()
            } else {
                s.clone()
            }
        }
        other => other.to_string(),
    }
}

fn decode_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Encode a query as a search string (without the leading `?`).
///
/// Keys are sorted so equal queries always encode identically. Null values
/// are omitted.
pub fn encode_query(query: &Query) -> String {
    let mut keys: Vec<&String> = query.keys().collect();
    keys.sort();

    keys.into_iter()
        .filter_map(|key| {
            let value = query.get(key)?;
            if value.is_null() {
                return None;
            }
            Some(format!(
                "{}={}",
                encode_component(key),
                encode_component(&encode_value(value))
            ))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Decode a search string (with or without the leading `?`) into a query.
pub fn decode_query(search: &str) -> Query {
    let search = search.strip_prefix('?').unwrap_or(search);
    let mut query = Query::new();

    for pair in search.split('&').filter(|p| !p.is_empty()) {
        let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(&key.replace('+', " "));
        let raw = decode_component(&raw.replace('+', " "));
        query.insert(key, decode_value(&raw));
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(value: Value) -> Query {
        value.as_object().cloned().unwrap()
    }

    // === Encoding Tests ===

    #[test]
    fn test_encode_sorts_keys() {
        let q = query(json!({"b": 2, "a": 1}));
        assert_eq!(encode_query(&q), "a=1&b=2");
    }

    #[test]
    fn test_encode_plain_string_is_raw() {
        let q = query(json!({"tab": "details"}));
        assert_eq!(encode_query(&q), "tab=details");
    }

    #[test]
    fn test_encode_json_like_string_is_quoted() {
        let q = query(json!({"id": "42"}));
        assert_eq!(encode_query(&q), "id=%2242%22");
    }

    #[test]
    fn test_encode_skips_null() {
        let q = query(json!({"a": null, "b": true}));
        assert_eq!(encode_query(&q), "b=true");
    }

    #[test]
    fn test_encode_escapes_reserved() {
        let q = query(json!({"q": "a b&c"}));
        assert_eq!(encode_query(&q), "q=a%20b%26c");
    }

    // === Decoding Tests ===

    #[test]
    fn test_decode_json_values() {
        let q = decode_query("?page=2&open=true&tags=%5B1%2C2%5D");
        assert_eq!(q.get("page"), Some(&json!(2)));
        assert_eq!(q.get("open"), Some(&json!(true)));
        assert_eq!(q.get("tags"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_decode_falls_back_to_string() {
        let q = decode_query("tab=details");
        assert_eq!(q.get("tab"), Some(&json!("details")));
    }

    #[test]
    fn test_decode_plus_is_space() {
        let q = decode_query("q=hello+world");
        assert_eq!(q.get("q"), Some(&json!("hello world")));
    }

    #[test]
    fn test_decode_quoted_number_stays_string() {
        let q = decode_query(&encode_query(&query(json!({"id": "42"}))));
        assert_eq!(q.get("id"), Some(&json!("42")));
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode_query("").is_empty());
        assert!(decode_query("?").is_empty());
    }
}
