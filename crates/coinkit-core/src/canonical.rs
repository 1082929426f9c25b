//! Canonical JSON encoding for deterministic signing.
//!
//! Every implementation of the ledger protocol signs the same bytes for the
//! same logical message, so the text form is fixed:
//!
//! - Object keys sorted by byte order, at every depth
//! - No insignificant whitespace
//! - Strings escaped the way `JSON.stringify` escapes them
//! - Numbers printed the way JavaScript prints them: integral values
//!   without a fraction, very large and very small magnitudes in exponent
//!   form (`1e+21`, `1e-7`)
//!
//! The output matches `json-stable-stringify` for the ASCII keys the ledger
//! uses.

use serde_json::{Map, Number, Value};

/// Encode a JSON value to its canonical text.
pub fn canonical_json(value: &Value) -> String {
    let mut buf = String::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Recursively encode a JSON value.
fn encode_value_to(buf: &mut String, value: &Value) {
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => encode_number(buf, n),
        Value::String(s) => encode_string(buf, s),
        Value::Array(items) => encode_array(buf, items),
        Value::Object(map) => encode_object_canonical(buf, map),
    }
}

/// Encode a number, dropping the fraction of integral floats.
fn encode_number(buf: &mut String, n: &Number) {
    if let Some(i) = n.as_i64() {
        buf.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        buf.push_str(&u.to_string());
    } else if let Some(f) = n.as_f64() {
        encode_float(buf, f);
    }
}

/// Encode a float the way `Number.prototype.toString` does.
///
/// Magnitudes in `[1e-6, 1e21)` are written in plain decimal, everything
/// else in exponent form with an explicit exponent sign.
fn encode_float(buf: &mut String, f: f64) {
    let magnitude = f.abs();
    if f == 0.0 {
        buf.push('0');
    } else if (1e-6..1e21).contains(&magnitude) {
        // 2^53: beyond this a float no longer has an exact integer form.
        if f.fract() == 0.0 && magnitude < 9_007_199_254_740_992.0 {
            buf.push_str(&(f as i64).to_string());
        } else {
            buf.push_str(&f.to_string());
        }
    } else {
        let text = format!("{f:e}");
        match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                buf.push_str(mantissa);
                buf.push_str("e+");
                buf.push_str(exponent);
            }
            _ => buf.push_str(&text),
        }
    }
}

/// Encode a string with JSON escapes.
fn encode_string(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\u{08}' => buf.push_str("\\b"),
            '\u{0c}' => buf.push_str("\\f"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                buf.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => buf.push(c),
        }
    }
    buf.push('"');
}

/// Encode an array, preserving element order.
fn encode_array(buf: &mut String, items: &[Value]) {
    buf.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        encode_value_to(buf, item);
    }
    buf.push(']');
}

/// Encode an object canonically.
///
/// Keys are sorted explicitly, so the result does not depend on whether
/// serde_json was built with `preserve_order`.
fn encode_object_canonical(buf: &mut String, map: &Map<String, Value>) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    buf.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        encode_string(buf, key);
        buf.push(':');
        encode_value_to(buf, value);
    }
    buf.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_at_every_depth() {
        let value = json!({
            "type": "Query",
            "message": {"zeta": 1, "alpha": {"b": true, "a": null}},
        });
        assert_eq!(
            canonical_json(&value),
            r#"{"message":{"alpha":{"a":null,"b":true},"zeta":1},"type":"Query"}"#
        );
    }

    #[test]
    fn test_deterministic_regardless_of_insertion_order() {
        let mut a = Map::new();
        a.insert("x".into(), json!(1));
        a.insert("y".into(), json!(2));
        let mut b = Map::new();
        b.insert("y".into(), json!(2));
        b.insert("x".into(), json!(1));
        assert_eq!(
            canonical_json(&Value::Object(a)),
            canonical_json(&Value::Object(b))
        );
    }

    #[test]
    fn test_arrays_keep_order() {
        assert_eq!(canonical_json(&json!([3, 1, 2])), "[3,1,2]");
    }

    #[test]
    fn test_string_escapes() {
        let value = json!("a\"b\\c\nd\u{1}e/é");
        assert_eq!(canonical_json(&value), "\"a\\\"b\\\\c\\nd\\u0001e/é\"");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(canonical_json(&json!(-5)), "-5");
        assert_eq!(canonical_json(&json!(u64::MAX)), u64::MAX.to_string());
        assert_eq!(canonical_json(&json!(2.0)), "2");
        assert_eq!(canonical_json(&json!(1.5)), "1.5");
    }

    #[test]
    fn test_float_exponent_form() {
        assert_eq!(canonical_json(&json!(1e21)), "1e+21");
        assert_eq!(canonical_json(&json!(-2.5e22)), "-2.5e+22");
        assert_eq!(canonical_json(&json!(1e-7)), "1e-7");
        assert_eq!(canonical_json(&json!(1.5e-7)), "1.5e-7");
        assert_eq!(canonical_json(&json!(0.000001)), "0.000001");
        assert_eq!(canonical_json(&json!(1.5e20)), "150000000000000000000");
        assert_eq!(canonical_json(&json!(0.1)), "0.1");
        assert_eq!(canonical_json(&json!(-0.0)), "0");
    }

    #[test]
    fn test_matches_compact_serde_for_plain_objects() {
        // serde_json's default map is sorted, so both must agree.
        let value = json!({"b": [1, {"d": "x", "c": 2}], "a": "colon:inside"});
        assert_eq!(canonical_json(&value), value.to_string());
    }
}
