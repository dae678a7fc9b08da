//! Typed values and coercion from command-line text.
//!
//! Every option and positional argument resolves to a [`ValueKind`] during
//! normalization. Tokens are converted with [`parse_text`]; schema defaults,
//! which may already be typed (YAML `true`, `8080`, lists), go through
//! [`coerce_default`]. Options without a default start from [`zero_value`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Variables of one parsed command, keyed by option or argument name.
pub type Vars = BTreeMap<String, Value>;

/// A typed value stored for an option or argument.
///
/// Deserialization is untagged so schema defaults and tags can be written
/// as plain YAML/JSON scalars, sequences and mappings.
///
/// # Examples
///
/// ```
/// use argspec_core::Value;
///
/// let v: Value = serde_json::from_str("[1, 2]").unwrap();
/// assert_eq!(v, Value::List(vec![Value::Integer(1), Value::Integer(2)]));
/// assert_eq!(Value::from("x").as_str(), Some("x"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns `true` for strings, booleans and numbers.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::List(_) | Value::Map(_))
    }

    fn describe(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("map[")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

/// Internal value type an option resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Map,
}

impl ValueKind {
    /// Resolves a declared type name.
    ///
    /// # Examples
    ///
    /// ```
    /// use argspec_core::ValueKind;
    ///
    /// assert_eq!(ValueKind::from_type_name(""), Some(ValueKind::String));
    /// assert_eq!(ValueKind::from_type_name("int"), Some(ValueKind::Integer));
    /// assert_eq!(ValueKind::from_type_name("dict"), Some(ValueKind::Map));
    /// assert_eq!(ValueKind::from_type_name("float"), None);
    /// ```
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" | "str" | "text" | "" => Some(ValueKind::String),
            "integer" | "int" => Some(ValueKind::Integer),
            "number" => Some(ValueKind::Number),
            "boolean" | "bool" => Some(ValueKind::Boolean),
            "map" | "dict" => Some(ValueKind::Map),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Map => "map",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to convert text or a default into the declared kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoerceError {
    #[error("invalid boolean: {0}")]
    InvalidBool(String),
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    /// `=value` with nothing before the separator.
    #[error("name should not be empty")]
    EmptyKey,
    #[error("invalid type: cannot use {found} as {expected}")]
    Unsupported {
        expected: &'static str,
        found: &'static str,
    },
}

/// Converts one token into a value of `kind`.
///
/// # Examples
///
/// ```
/// use argspec_core::{parse_text, Value, ValueKind};
///
/// assert_eq!(parse_text(ValueKind::Integer, "0x10").unwrap(), Value::Integer(16));
/// assert_eq!(parse_text(ValueKind::Boolean, "T").unwrap(), Value::Bool(true));
///
/// let kv = parse_text(ValueKind::Map, "color=red").unwrap();
/// assert_eq!(kv.as_map().unwrap()["color"], Value::from("red"));
/// assert!(parse_text(ValueKind::Map, "=red").is_err());
/// ```
pub fn parse_text(kind: ValueKind, text: &str) -> Result<Value, CoerceError> {
    match kind {
        ValueKind::String => Ok(Value::String(text.to_string())),
        ValueKind::Boolean => parse_bool(text).map(Value::Bool),
        ValueKind::Integer => parse_int(text).map(Value::Integer),
        ValueKind::Number => parse_float(text).map(Value::Number),
        ValueKind::Map => parse_map_entry(text),
    }
}

/// Converts a default from the schema, which may already be typed.
///
/// With `list` set, a scalar default becomes a one-element list and a
/// sequence default has every element converted.
pub fn coerce_default(kind: ValueKind, list: bool, value: &Value) -> Result<Value, CoerceError> {
    if !list {
        return coerce_scalar(kind, value);
    }
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| coerce_scalar(kind, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Value::Map(_) => Err(CoerceError::Unsupported {
            expected: "list",
            found: value.describe(),
        }),
        scalar => Ok(Value::List(vec![coerce_scalar(kind, scalar)?])),
    }
}

/// Value materialized for an option that declares no default.
///
/// # Examples
///
/// ```
/// use argspec_core::{zero_value, Value, ValueKind};
///
/// assert_eq!(zero_value(ValueKind::Boolean, false), Value::Bool(false));
/// assert_eq!(zero_value(ValueKind::Integer, true), Value::List(Vec::new()));
/// ```
pub fn zero_value(kind: ValueKind, list: bool) -> Value {
    if list {
        return Value::List(Vec::new());
    }
    match kind {
        ValueKind::String => Value::String(String::new()),
        ValueKind::Boolean => Value::Bool(false),
        ValueKind::Integer => Value::Integer(0),
        ValueKind::Number => Value::Number(0.0),
        ValueKind::Map => Value::Map(BTreeMap::new()),
    }
}

fn coerce_scalar(kind: ValueKind, value: &Value) -> Result<Value, CoerceError> {
    let unsupported = || CoerceError::Unsupported {
        expected: kind.as_str(),
        found: value.describe(),
    };
    match (kind, value) {
        (ValueKind::String, v) if v.is_scalar() => Ok(Value::String(v.to_string())),
        (ValueKind::Boolean, Value::Bool(b)) => Ok(Value::Bool(*b)),
        (ValueKind::Boolean, Value::String(s)) => parse_bool(s).map(Value::Bool),
        (ValueKind::Boolean, Value::Integer(i)) => Ok(Value::Bool(*i != 0)),
        (ValueKind::Integer, Value::Integer(i)) => Ok(Value::Integer(*i)),
        (ValueKind::Integer, Value::String(s)) => parse_int(s).map(Value::Integer),
        (ValueKind::Number, Value::Number(n)) => Ok(Value::Number(*n)),
        (ValueKind::Number, Value::Integer(i)) => Ok(Value::Number(*i as f64)),
        (ValueKind::Number, Value::String(s)) => parse_float(s).map(Value::Number),
        (ValueKind::Map, Value::String(s)) => parse_map_entry(s),
        (ValueKind::Map, Value::Map(map)) => Ok(Value::Map(map.clone())),
        _ => Err(unsupported()),
    }
}

fn parse_bool(text: &str) -> Result<bool, CoerceError> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(CoerceError::InvalidBool(text.to_string())),
    }
}

/// Integer text with an optional sign and base prefix (`0x`, `0o`, `0b`,
/// or a leading `0` for octal). Underscores are only allowed after a prefix.
fn parse_int(text: &str) -> Result<i64, CoerceError> {
    let invalid = || CoerceError::InvalidInteger(text.to_string());

    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let lower = unsigned.to_ascii_lowercase();
    let (radix, digits, prefixed) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest.to_string(), true)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest.to_string(), true)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest.to_string(), true)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, lower[1..].to_string(), true)
    } else {
        (10, lower, false)
    };

    let digits = if prefixed {
        digits.replace('_', "")
    } else {
        digits
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }

    let magnitude = u64::from_str_radix(&digits, radix).map_err(|_| invalid())?;
    let signed = if negative {
        -i128::from(magnitude)
    } else {
        i128::from(magnitude)
    };
    i64::try_from(signed).map_err(|_| invalid())
}

fn parse_float(text: &str) -> Result<f64, CoerceError> {
    text.parse::<f64>()
        .map_err(|_| CoerceError::InvalidNumber(text.to_string()))
}

/// `key=value` sets one string key, a bare `key` sets it to `true`.
fn parse_map_entry(text: &str) -> Result<Value, CoerceError> {
    let mut map = BTreeMap::new();
    match text.find('=') {
        Some(0) => return Err(CoerceError::EmptyKey),
        Some(pos) => {
            map.insert(
                text[..pos].to_string(),
                Value::String(text[pos + 1..].to_string()),
            );
        }
        None => {
            map.insert(text.to_string(), Value::Bool(true));
        }
    }
    Ok(Value::Map(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_canonical_forms() {
        for text in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_text(ValueKind::Boolean, text), Ok(Value::Bool(true)));
        }
        for text in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_text(ValueKind::Boolean, text), Ok(Value::Bool(false)));
        }
        assert_eq!(
            parse_text(ValueKind::Boolean, "yes"),
            Err(CoerceError::InvalidBool("yes".to_string()))
        );
    }

    #[test]
    fn test_parse_int_bases_and_signs() {
        assert_eq!(parse_int("42"), Ok(42));
        assert_eq!(parse_int("-42"), Ok(-42));
        assert_eq!(parse_int("+7"), Ok(7));
        assert_eq!(parse_int("0x1F"), Ok(31));
        assert_eq!(parse_int("0b101"), Ok(5));
        assert_eq!(parse_int("0o17"), Ok(15));
        assert_eq!(parse_int("017"), Ok(15));
        assert_eq!(parse_int("0x_ff"), Ok(255));
        assert_eq!(parse_int("0"), Ok(0));
        assert_eq!(parse_int("-9223372036854775808"), Ok(i64::MIN));
    }

    #[test]
    fn test_parse_int_rejects_garbage() {
        for text in ["", "-", "abc", "1_000", "09", "0x", "9223372036854775808", "--1", "1.5"] {
            assert!(parse_int(text).is_err(), "{text:?} should be rejected");
        }
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_text(ValueKind::Number, "3.14"), Ok(Value::Number(3.14)));
        assert_eq!(parse_text(ValueKind::Number, "6"), Ok(Value::Number(6.0)));
        assert!(parse_text(ValueKind::Number, "not-num").is_err());
    }

    #[test]
    fn test_parse_map_entry_forms() {
        let value = parse_text(ValueKind::Map, "a=b=c").unwrap();
        assert_eq!(value.as_map().unwrap()["a"], Value::from("b=c"));

        let value = parse_text(ValueKind::Map, "flag").unwrap();
        assert_eq!(value.as_map().unwrap()["flag"], Value::Bool(true));

        assert_eq!(parse_text(ValueKind::Map, "="), Err(CoerceError::EmptyKey));
    }

    #[test]
    fn test_coerce_default_scalars() {
        assert_eq!(
            coerce_default(ValueKind::String, false, &Value::Integer(8080)),
            Ok(Value::from("8080"))
        );
        assert_eq!(
            coerce_default(ValueKind::Boolean, false, &Value::Integer(0)),
            Ok(Value::Bool(false))
        );
        assert_eq!(
            coerce_default(ValueKind::Number, false, &Value::Integer(3)),
            Ok(Value::Number(3.0))
        );
        assert!(coerce_default(ValueKind::Integer, false, &Value::Number(1.5)).is_err());
        assert!(coerce_default(ValueKind::String, false, &Value::List(Vec::new())).is_err());
    }

    #[test]
    fn test_coerce_default_lists() {
        assert_eq!(
            coerce_default(ValueKind::Number, true, &Value::Number(3.14)),
            Ok(Value::List(vec![Value::Number(3.14)]))
        );
        assert_eq!(
            coerce_default(
                ValueKind::Integer,
                true,
                &Value::List(vec![Value::from("1"), Value::Integer(2)])
            ),
            Ok(Value::List(vec![Value::Integer(1), Value::Integer(2)]))
        );
        assert!(coerce_default(ValueKind::Integer, true, &Value::Map(BTreeMap::new())).is_err());
    }

    #[test]
    fn test_zero_values_are_type_correct() {
        assert_eq!(zero_value(ValueKind::String, false), Value::from(""));
        assert_eq!(zero_value(ValueKind::Number, false), Value::Number(0.0));
        assert_eq!(zero_value(ValueKind::Integer, false), Value::Integer(0));
        assert_eq!(zero_value(ValueKind::Map, false), Value::Map(BTreeMap::new()));
        assert_eq!(zero_value(ValueKind::String, true), Value::List(Vec::new()));
    }

    #[test]
    fn test_display_matches_scalar_text() {
        assert_eq!(Value::Number(3.14).to_string(), "3.14");
        assert_eq!(Value::Number(1.0).to_string(), "1");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(
            Value::List(vec![Value::Integer(1), Value::Integer(2)]).to_string(),
            "[1 2]"
        );
    }
}
