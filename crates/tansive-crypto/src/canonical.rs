//! Canonical JSON encoding.
//!
//! Audit entries (C1) and tokens (C4) are signed over a canonical byte
//! representation of their JSON payload so that signature verification does
//! not depend on serde's field order or incidental whitespace: object keys
//! are sorted and the encoding carries no insignificant whitespace.

use serde_json::Value;

/// Serialize a JSON value into its canonical byte form.
///
/// Object keys are sorted lexicographically at every nesting level; arrays
/// keep their original order (order is significant there). Numbers, strings
/// and literals are serialized exactly as `serde_json` would in compact mode.
#[must_use]
pub fn canonicalize(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(&Value::String((*key).clone()), out);
                out.push(b':');
                write_canonical(&map[*key], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        other => {
            // serde_json's compact writer never emits insignificant
            // whitespace for scalars, so this is already canonical.
            out.extend_from_slice(
                serde_json::to_string(other)
                    .expect("scalar json values always serialize")
                    .as_bytes(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys_at_every_level() {
        let value = json!({"b": 1, "a": {"z": 1, "y": 2}});
        assert_eq!(canonicalize(&value), br#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn preserves_array_order() {
        let value = json!({"a": [3, 1, 2]});
        assert_eq!(canonicalize(&value), br#"{"a":[3,1,2]}"#);
    }

    #[test]
    fn is_deterministic_across_key_insertion_order() {
        let v1 = json!({"a": 1, "b": 2});
        let v2: Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        assert_eq!(canonicalize(&v1), canonicalize(&v2));
    }
}
