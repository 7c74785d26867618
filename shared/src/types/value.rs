//! Scalar values carried through ingestion, aggregation and storage

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single scalar reading.
///
/// Untagged so that JSON `5` parses as an integer, `5.5` as a real and
/// `"open"` as a text label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl ScalarValue {
    /// Numeric view of the value. Text never converts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Real(r) => Some(*r),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used for majority tie-breaking: numbers (ascending, NaN
    /// last via `f64::total_cmp`) sort before text, text sorts lexicographically.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Text(_), _) => Ordering::Greater,
            (_, Self::Text(_)) => Ordering::Less,
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (a, b) => {
                // Both numeric here; as_f64 cannot fail.
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Real(r) => write!(f, "{}", r),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Key wrapper giving `ScalarValue` a total `Ord` so it can index a `BTreeMap`.
#[derive(Debug, Clone)]
pub struct OrderedValue(pub ScalarValue);

impl PartialEq for OrderedValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for OrderedValue {}

impl PartialOrd for OrderedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_json() {
        let v: Vec<ScalarValue> = serde_json::from_str(r#"[5, 5.5, "open"]"#).unwrap();
        assert_eq!(v[0], ScalarValue::Integer(5));
        assert_eq!(v[1], ScalarValue::Real(5.5));
        assert_eq!(v[2], ScalarValue::Text("open".to_string()));
    }

    #[test]
    fn test_total_cmp_orders_numbers_before_text() {
        let mut values = vec![
            ScalarValue::from("b"),
            ScalarValue::Real(2.5),
            ScalarValue::from("a"),
            ScalarValue::Integer(1),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![
                ScalarValue::Integer(1),
                ScalarValue::Real(2.5),
                ScalarValue::from("a"),
                ScalarValue::from("b"),
            ]
        );
    }

    #[test]
    fn test_integer_and_real_compare_numerically() {
        assert_eq!(
            OrderedValue(ScalarValue::Integer(3)),
            OrderedValue(ScalarValue::Real(3.0))
        );
    }
}
