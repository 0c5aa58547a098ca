//! Values - Dynamic property values for props, environment state and result rows.
//!
//! A [`Record`] is an insertion-ordered map from property name to [`Value`].
//! Reactive records, setup data accessors and scene results all use it.
//!
//! # Same-value equality
//!
//! [`Value::same_value`] decides whether a write is a change. Numbers follow
//! `Object.is`: `NaN` equals `NaN`, `+0` and `-0` differ. Lists compare
//! element-wise with the same rule.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered property record.
pub type Record = IndexMap<String, Value>;

// =============================================================================
// Value
// =============================================================================

/// A primitive property value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// `Object.is`-style comparison.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => same_number(*a, *b),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

fn same_number(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    a.to_bits() == b.to_bits()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build a [`Record`] from `key => value` pairs.
///
/// ```
/// use psyframe::record;
///
/// let props = record! { "contrast" => 0.5, "label" => "left" };
/// assert_eq!(props.len(), 2);
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.insert(::std::string::String::from($key), $crate::Value::from($value)); )+
        record
    }};
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_is_same_value() {
        assert!(Value::Number(f64::NAN).same_value(&Value::Number(f64::NAN)));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn test_signed_zero_differs() {
        assert!(!Value::Number(0.0).same_value(&Value::Number(-0.0)));
        assert!(Value::Number(-0.0).same_value(&Value::Number(-0.0)));
    }

    #[test]
    fn test_kinds_never_match() {
        assert!(!Value::Null.same_value(&Value::Bool(false)));
        assert!(!Value::Number(1.0).same_value(&Value::Text("1".into())));
    }

    #[test]
    fn test_lists_compare_elementwise() {
        let a = Value::from(vec![1.0, f64::NAN]);
        let b = Value::from(vec![1.0, f64::NAN]);
        let c = Value::from(vec![1.0, 2.0]);
        assert!(a.same_value(&b));
        assert!(!a.same_value(&c));
    }

    #[test]
    fn test_record_macro_keeps_order() {
        let r = record! { "b" => 1, "a" => "x", "c" => true };
        let keys: Vec<_> = r.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(r["a"].as_str(), Some("x"));
    }

    #[test]
    fn test_serializes_untagged() {
        let r = record! { "n" => 2.5, "s" => "hi", "none" => Value::Null };
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"n":2.5,"s":"hi","none":null}"#);
    }
}
