//! Scalar conventions of the grammar document.
//!
//! Integers appear as YAML numbers or as strings, in decimal or
//! `0x`-prefixed hex; a non-numeric string in a length position is a
//! sibling-field reference.

use serde_yaml::Value;

use crate::model::LengthSpec;

/// Parse an integer from a YAML scalar: number, decimal string, or
/// `0x` hex string (sign allowed).
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok())),
        Value::String(s) => parse_int_str(s),
        _ => None,
    }
}

/// Parse an integer from text: decimal or `0x`/`-0x` hex.
pub fn parse_int_str(s: &str) -> Option<i64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let (negative, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse a non-negative integer scalar.
pub fn parse_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_int_str(s).and_then(|v| u64::try_from(v).ok()),
        _ => None,
    }
}

/// Parse a `length:`-position value into a [`LengthSpec`].
///
/// Priority: literal integer → hex string → sibling reference. A
/// mapping `{ ref: <name> }` is an explicit reference.
pub fn parse_length_spec(value: &Value) -> Result<LengthSpec, String> {
    match value {
        Value::Number(_) => match parse_u64(value) {
            Some(n) => Ok(LengthSpec::Literal(n)),
            None => Err("length must be a non-negative integer".into()),
        },
        Value::String(s) => match parse_int_str(s) {
            Some(n) if n >= 0 => Ok(LengthSpec::Literal(n as u64)),
            Some(_) => Err(format!("length '{s}' must be non-negative")),
            None => {
                if is_identifier(s) {
                    Ok(LengthSpec::Ref(s.to_string()))
                } else {
                    Err(format!("length '{s}' is neither an integer nor a field reference"))
                }
            }
        },
        Value::Mapping(map) => match map.get("ref") {
            Some(Value::String(name)) if is_identifier(name) => {
                Ok(LengthSpec::Ref(name.to_string()))
            }
            _ => Err("length mapping must be { ref: <field> }".into()),
        },
        _ => Err("length must be an integer, a field reference, or { ref: <field> }".into()),
    }
}

/// Field-reference identifiers: leading alpha/underscore, then
/// alphanumerics/underscores.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a boolean scalar (`true`/`false`, bare or quoted).
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Scalar to display text for diagnostics.
pub fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{s}'"),
        Value::Sequence(_) => "a sequence".into(),
        Value::Mapping(_) => "a mapping".into(),
        Value::Tagged(_) => "a tagged value".into(),
    }
}
