// silver-core/src/domain/value.rs

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A single typed cell, after parsing out of the weakly typed bronze layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Text(String),
}

static NULL_VALUE: Value = Value::Null;

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::Text(_) => "text",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Text(_) => 2,
            Value::Date(_) => 3,
            Value::Timestamp(_) => 4,
        }
    }

    /// Total order used wherever the engine needs a stable sort.
    ///
    /// Null sorts first, numbers compare numerically across Int/Float,
    /// then text, dates and timestamps.
    pub fn cmp_total(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (a, b) if a.rank() == 1 && b.rank() == 1 => {
                let (x, y) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
                x.total_cmp(&y)
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// One row flowing through the evaluator, addressed by column name.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing fields read as NULL.
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL_VALUE)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set(field, value);
        self
    }

    pub fn take(&mut self, field: &str) -> Value {
        self.fields.remove(field).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Compares two records field by field in column-name order.
    pub fn cmp_total(&self, other: &Record) -> Ordering {
        for ((ka, va), (kb, vb)) in self.fields.iter().zip(other.fields.iter()) {
            let ord = ka.cmp(kb).then_with(|| va.cmp_total(vb));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.fields.len().cmp(&other.fields.len())
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ordering_crosses_int_and_float() {
        assert_eq!(Value::Int(2).cmp_total(&Value::Float(1.5)), Ordering::Greater);
        assert_eq!(Value::Float(2.0).cmp_total(&Value::Int(2)), Ordering::Equal);
    }

    #[test]
    fn test_null_sorts_first() {
        assert_eq!(Value::Null.cmp_total(&Value::Int(-10)), Ordering::Less);
        assert_eq!(Value::text("a").cmp_total(&Value::Null), Ordering::Greater);
    }

    #[test]
    fn test_missing_field_reads_null() {
        let rec = Record::new().with("a", Value::Int(1));
        assert_eq!(rec.get("a"), &Value::Int(1));
        assert!(rec.get("b").is_null());
    }

    #[test]
    fn test_untagged_value_deserialization() {
        let v: Vec<Value> = serde_yaml::from_str("[null, 0, 1.5, 2024-01-31, hello]").unwrap();
        assert_eq!(
            v,
            vec![
                Value::Null,
                Value::Int(0),
                Value::Float(1.5),
                Value::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
                Value::text("hello"),
            ]
        );
    }

    #[test]
    fn test_record_ordering_is_field_wise() {
        let a = Record::new().with("k", Value::Int(1)).with("v", Value::text("a"));
        let b = Record::new().with("k", Value::Int(1)).with("v", Value::text("b"));
        assert_eq!(a.cmp_total(&b), Ordering::Less);
        assert_eq!(b.cmp_total(&a), Ordering::Greater);
        assert_eq!(a.cmp_total(&a.clone()), Ordering::Equal);
    }
}
