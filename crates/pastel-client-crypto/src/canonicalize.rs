use pastel_client_core::Envelope;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalizeError {
    #[error("failed to serialize message to JSON: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("canonicalized message is not a JSON object")]
    NotAnObject,
}

/// Produce the canonical textual form of `message`'s fields, excluding the
/// hash field, signature field, and any other field the message kind
/// declares as framework-internal (spec §4.1).
///
/// Canonical form:
/// - object keys sorted lexicographically at every depth
/// - `": "` between key and value, `", "` between entries (Python
///   `json.dumps(..., sort_keys=True)`-style separators)
/// - numbers are emitted as JSON numbers, never as strings
/// - a field whose name ends in `_json_b64` is opaque base64 and passed
///   through unchanged
/// - a field whose name ends in `_json` is parsed as JSON text and
///   recursively re-canonicalized, so hashing is stable regardless of
///   whitespace/key-order differences between producers
pub fn canonicalize<T: Envelope>(message: &T) -> Result<String, CanonicalizeError> {
    let value = serde_json::to_value(message)?;
    let Value::Object(mut map) = value else {
        return Err(CanonicalizeError::NotAnObject);
    };
    for field in T::excluded_fields() {
        map.remove(*field);
    }
    Ok(canonicalize_value(&Value::Object(map)))
}

/// Canonicalize an already-built [`Value`], without any field exclusion.
/// Used both by [`canonicalize`] on the top-level object and recursively
/// for nested `_json` fields.
pub fn canonicalize_value(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let rendered: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}: {}", quote(k), render_field(k, &map[k])))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonicalize_value).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::String(s) => quote(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

fn render_field(key: &str, value: &Value) -> String {
    if key.ends_with("_json_b64") {
        // Opaque base64 bag: pass the string through unchanged.
        return quote(value.as_str().unwrap_or_default());
    }
    if key.ends_with("_json") {
        let parsed = match value {
            Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
            other => other.clone(),
        };
        return quote(&canonicalize_value(&parsed));
    }
    canonicalize_value(value)
}

fn quote(s: &str) -> String {
    // Reuse serde_json's string escaping rather than hand-rolling it.
    serde_json::to_string(s).expect("string serialization is infallible")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_and_spaces_separators() {
        let v = json!({"b": 1, "a": "x"});
        assert_eq!(canonicalize_value(&v), r#"{"a": "x", "b": 1}"#);
    }

    #[test]
    fn numbers_stay_numbers() {
        let v = json!({"credits": 250});
        assert_eq!(canonicalize_value(&v), r#"{"credits": 250}"#);
    }

    #[test]
    fn json_b64_field_passes_through_unchanged() {
        let v = json!({"params_json_b64": "eyJhIjoxfQ=="});
        assert_eq!(
            canonicalize_value(&v),
            r#"{"params_json_b64": "eyJhIjoxfQ=="}"#
        );
    }

    #[test]
    fn json_field_is_reparsed_and_recanonicalized() {
        let v = json!({"extra_json": "{\"b\":2,\"a\":1}"});
        let out = canonicalize_value(&v);
        assert_eq!(out, r#"{"extra_json": "{\"a\": 1, \"b\": 2}"}"#);
    }

    #[test]
    fn nested_objects_sort_at_every_depth() {
        let v = json!({"outer": {"z": 1, "a": {"y": 2, "x": 1}}});
        assert_eq!(
            canonicalize_value(&v),
            r#"{"outer": {"a": {"x": 1, "y": 2}, "z": 1}}"#
        );
    }
}
