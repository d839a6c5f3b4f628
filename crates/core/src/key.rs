//! Canonical value encoding for keys.
//!
//! Operator storage keys, group-by keys, and the stringified values used
//! when ordering normalized WHERE conditions all need one deterministic
//! rendering of a `Value`. The encoding is JSON-shaped: `null`, `true`,
//! `false`, numbers, quoted strings with `"` and `\` escaped, and
//! bracketed arrays. Two values encode identically iff they compare equal.

use crate::value::Value;
use alloc::string::String;
use core::fmt::Write;

/// Appends the canonical encoding of `value` to `out`.
pub fn encode_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Int(i) => {
            let _ = write!(out, "{}", i);
        }
        Value::Float(f) => {
            if f.is_nan() {
                out.push_str("nan");
            } else if f.is_infinite() {
                out.push_str(if *f > 0.0 { "inf" } else { "-inf" });
            } else {
                let _ = write!(out, "{}", f);
            }
        }
        Value::Text(s) => encode_text(s, out),
        Value::Array(vs) => {
            out.push('[');
            for (i, v) in vs.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_value(v, out);
            }
            out.push(']');
        }
    }
}

fn encode_text(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Canonical encoding of a single value.
pub fn value_string(value: &Value) -> String {
    let mut out = String::new();
    encode_value(value, &mut out);
    out
}

/// Canonical encoding of a value tuple, e.g. a group key or primary key.
pub fn tuple_string(values: &[Value]) -> String {
    let mut out = String::new();
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        encode_value(v, &mut out);
    }
    out.push(']');
    out
}

/// Builds an operator-storage key from a namespace tag and value parts.
///
/// Every part is followed by a `,`, including the last, so that a prefix
/// scan over `tag,part1,` cannot collide with a longer first part.
pub fn storage_key(tag: &str, parts: &[&Value]) -> String {
    let mut out = String::new();
    out.push_str(tag);
    out.push(',');
    for part in parts {
        encode_value(part, &mut out);
        out.push(',');
    }
    out
}

/// Builds the prefix covering all storage keys that start with the given
/// leading parts.
pub fn storage_prefix(tag: &str, parts: &[&Value]) -> String {
    storage_key(tag, parts)
}
