//! Cycle-safe JSON serialization for diagnostic log lines.
//!
//! # Responsibilities
//! - Stringify parsed request bodies for forwarding and logging
//! - Stringify header maps for diagnostic log lines
//!
//! # Design Decisions
//! - Explicit walker instead of `serde_json::to_string`: composite nodes are
//!   tracked by address and repeats are omitted instead of recursed, so the
//!   serializer terminates on any input shape
//! - Omitted object members disappear; omitted array slots become `null`
//!   (an array must keep its arity)

use axum::http::HeaderMap;
use serde_json::Value;

/// Serialize a JSON value to its compact wire form.
///
/// Structurally identical to `serde_json::to_string` for tree-shaped values,
/// but never fails and never recurses into a composite node twice.
pub fn stringify(value: &Value) -> String {
    let mut out = String::new();
    let mut seen: Vec<*const Value> = Vec::new();
    write_value(&mut out, value, &mut seen);
    out
}

fn write_value(out: &mut String, value: &Value, seen: &mut Vec<*const Value>) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&escape(s)),
        Value::Object(map) => {
            seen.push(value as *const Value);
            out.push('{');
            let mut first = true;
            for (key, member) in map {
                if is_repeat(member, seen) {
                    continue;
                }
                if !first {
                    out.push(',');
                }
                first = false;
                out.push_str(&escape(key));
                out.push(':');
                write_value(out, member, seen);
            }
            out.push('}');
        }
        Value::Array(items) => {
            seen.push(value as *const Value);
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                if is_repeat(item, seen) {
                    // arrays keep their arity; a repeated node becomes null
                    out.push_str("null");
                } else {
                    write_value(out, item, seen);
                }
            }
            out.push(']');
        }
    }
}

/// A composite node already on the visit path is a repeat.
fn is_repeat(value: &Value, seen: &[*const Value]) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
        && seen.contains(&(value as *const Value))
}

fn escape(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

/// Serialize a header map to a JSON object string for log output.
///
/// Header names are lowercased by the http crate; values that are not valid
/// UTF-8 are replaced lossily. Duplicate names keep the last value.
pub fn stringify_headers(headers: &HeaderMap) -> String {
    let mut map = serde_json::Map::new();
    for (name, value) in headers {
        map.insert(
            name.as_str().to_string(),
            Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
        );
    }
    stringify(&Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_stringify_matches_serde_for_trees() {
        let cases = vec![
            json!(null),
            json!(true),
            json!(42),
            json!(-1.5),
            json!("with \"quotes\" and \n newline"),
            json!([1, "two", null, {"nested": [3.5, false]}]),
            json!({"a": 1, "b": {"c": ["d", {"e": null}]}}),
        ];
        for value in cases {
            assert_eq!(
                stringify(&value),
                serde_json::to_string(&value).unwrap(),
                "mismatch for {value}"
            );
        }
    }

    #[test]
    fn test_stringify_empty_composites() {
        assert_eq!(stringify(&json!({})), "{}");
        assert_eq!(stringify(&json!([])), "[]");
    }

    #[test]
    fn test_stringify_headers_as_object() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("x-reverse-proxy", HeaderValue::from_static("secret"));
        let out = stringify_headers(&headers);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["content-type"], "application/json");
        assert_eq!(parsed["x-reverse-proxy"], "secret");
    }
}
