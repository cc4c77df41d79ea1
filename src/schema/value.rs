//! Predicate values and the query-string mini-language.
//!
//! Space-Track encodes operators inside path segments: `>value`, `<value`,
//! `<>value`, `left--right`, `~~value`, `^value`, comma-separated lists and
//! `null-val`.

use super::predicate::{Predicate, PredicateType};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum PredicateValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    List(Vec<PredicateValue>),
    Op(Operator),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    GreaterThan(Box<PredicateValue>),
    LessThan(Box<PredicateValue>),
    NotEqual(Box<PredicateValue>),
    InclusiveRange(Box<PredicateValue>, Box<PredicateValue>),
    Like(Box<PredicateValue>),
    StartsWith(Box<PredicateValue>),
}

/// `>value`
pub fn greater_than(value: impl Into<PredicateValue>) -> PredicateValue {
    PredicateValue::Op(Operator::GreaterThan(Box::new(value.into())))
}

/// `<value`
pub fn less_than(value: impl Into<PredicateValue>) -> PredicateValue {
    PredicateValue::Op(Operator::LessThan(Box::new(value.into())))
}

/// `<>value`
pub fn not_equal(value: impl Into<PredicateValue>) -> PredicateValue {
    PredicateValue::Op(Operator::NotEqual(Box::new(value.into())))
}

/// `left--right`
pub fn inclusive_range(
    left: impl Into<PredicateValue>,
    right: impl Into<PredicateValue>,
) -> PredicateValue {
    PredicateValue::Op(Operator::InclusiveRange(
        Box::new(left.into()),
        Box::new(right.into()),
    ))
}

/// `~~value`
pub fn like(value: impl Into<PredicateValue>) -> PredicateValue {
    PredicateValue::Op(Operator::Like(Box::new(value.into())))
}

/// `^value`
pub fn startswith(value: impl Into<PredicateValue>) -> PredicateValue {
    PredicateValue::Op(Operator::StartsWith(Box::new(value.into())))
}

impl PredicateValue {
    /// Render the value the way Space-Track expects it in a query path.
    pub fn to_query_string(&self) -> String {
        match self {
            PredicateValue::Null => "null-val".to_string(),
            PredicateValue::Bool(b) => b.to_string(),
            PredicateValue::Int(i) => i.to_string(),
            PredicateValue::Float(f) => f.to_string(),
            PredicateValue::Str(s) => s.clone(),
            PredicateValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            PredicateValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            PredicateValue::List(items) => items
                .iter()
                .map(PredicateValue::to_query_string)
                .collect::<Vec<_>>()
                .join(","),
            PredicateValue::Op(op) => op.to_query_string(),
        }
    }

    /// Best-effort conversion of string values into the predicate's type.
    ///
    /// Values that do not parse are returned unchanged.
    pub fn coerce(self, predicate: &Predicate) -> PredicateValue {
        match self {
            PredicateValue::Str(s) => coerce_str(s, predicate.ty),
            PredicateValue::List(items) => PredicateValue::List(
                items.into_iter().map(|v| v.coerce(predicate)).collect(),
            ),
            PredicateValue::Op(op) => PredicateValue::Op(op.coerce(predicate)),
            other => other,
        }
    }
}

fn coerce_str(s: String, ty: PredicateType) -> PredicateValue {
    let trimmed = s.trim();
    let parsed = match ty {
        PredicateType::Int => trimmed.parse().ok().map(PredicateValue::Int),
        PredicateType::Float => trimmed.parse().ok().map(PredicateValue::Float),
        PredicateType::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(PredicateValue::Bool(true)),
            "false" | "0" => Some(PredicateValue::Bool(false)),
            _ => None,
        },
        PredicateType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .map(PredicateValue::Date),
        PredicateType::DateTime => super::typed::parse_datetime(trimmed).map(PredicateValue::DateTime),
        _ => None,
    };
    parsed.unwrap_or(PredicateValue::Str(s))
}

impl Operator {
    fn to_query_string(&self) -> String {
        match self {
            Operator::GreaterThan(v) => format!(">{}", v.to_query_string()),
            Operator::LessThan(v) => format!("<{}", v.to_query_string()),
            Operator::NotEqual(v) => format!("<>{}", v.to_query_string()),
            Operator::InclusiveRange(l, r) => {
                format!("{}--{}", l.to_query_string(), r.to_query_string())
            }
            Operator::Like(v) => format!("~~{}", v.to_query_string()),
            Operator::StartsWith(v) => format!("^{}", v.to_query_string()),
        }
    }

    fn coerce(self, predicate: &Predicate) -> Operator {
        let c = |v: Box<PredicateValue>| Box::new(v.coerce(predicate));
        match self {
            Operator::GreaterThan(v) => Operator::GreaterThan(c(v)),
            Operator::LessThan(v) => Operator::LessThan(c(v)),
            Operator::NotEqual(v) => Operator::NotEqual(c(v)),
            Operator::InclusiveRange(l, r) => Operator::InclusiveRange(c(l), c(r)),
            // Patterns stay textual.
            op @ (Operator::Like(_) | Operator::StartsWith(_)) => op,
        }
    }
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl From<bool> for PredicateValue {
    fn from(v: bool) -> Self {
        PredicateValue::Bool(v)
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for PredicateValue {
            fn from(v: $t) -> Self {
                PredicateValue::Int(v as i64)
            }
        })*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for PredicateValue {
    fn from(v: f32) -> Self {
        PredicateValue::Float(v as f64)
    }
}

impl From<f64> for PredicateValue {
    fn from(v: f64) -> Self {
        PredicateValue::Float(v)
    }
}

impl From<&str> for PredicateValue {
    fn from(v: &str) -> Self {
        PredicateValue::Str(v.to_string())
    }
}

impl From<String> for PredicateValue {
    fn from(v: String) -> Self {
        PredicateValue::Str(v)
    }
}

impl From<&String> for PredicateValue {
    fn from(v: &String) -> Self {
        PredicateValue::Str(v.clone())
    }
}

impl From<NaiveDate> for PredicateValue {
    fn from(v: NaiveDate) -> Self {
        PredicateValue::Date(v)
    }
}

impl From<NaiveDateTime> for PredicateValue {
    fn from(v: NaiveDateTime) -> Self {
        PredicateValue::DateTime(v)
    }
}

impl<T: Into<PredicateValue>> From<Option<T>> for PredicateValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(PredicateValue::Null, Into::into)
    }
}

impl<T: Into<PredicateValue>> From<Vec<T>> for PredicateValue {
    fn from(v: Vec<T>) -> Self {
        PredicateValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PredicateValue> + Clone> From<&[T]> for PredicateValue {
    fn from(v: &[T]) -> Self {
        PredicateValue::List(v.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<PredicateValue>, const N: usize> From<[T; N]> for PredicateValue {
    fn from(v: [T; N]) -> Self {
        PredicateValue::List(v.into_iter().map(Into::into).collect())
    }
}
