//! Strict type parsing of buffered JSON rows against predicate metadata.

use super::predicate::{Predicate, PredicateType};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// What to do with values whose predicate type is [`PredicateType::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownTypePolicy {
    /// Keep the raw JSON value.
    #[default]
    PassThrough,
    /// Fail with [`Error::UnsupportedPredicateType`].
    Reject,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Field without a matching predicate, or of an unknown type.
    Raw(Value),
}

pub type TypedRow = BTreeMap<String, TypedValue>;

pub(crate) fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl Predicate {
    /// Convert one response value according to this predicate's type.
    pub fn parse(&self, value: &Value, policy: UnknownTypePolicy) -> Result<TypedValue> {
        if value.is_null() {
            return Ok(TypedValue::Null);
        }
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let fail = |message: &str| Error::TypeParse {
            field: self.name.clone(),
            value: text.clone(),
            message: message.to_string(),
        };

        match self.ty {
            PredicateType::Int => match value.as_i64() {
                Some(i) => Ok(TypedValue::Int(i)),
                None => text
                    .trim()
                    .parse()
                    .map(TypedValue::Int)
                    .map_err(|_| fail("expected an integer")),
            },
            PredicateType::Float => match value.as_f64() {
                Some(f) => Ok(TypedValue::Float(f)),
                None => text
                    .trim()
                    .parse()
                    .map(TypedValue::Float)
                    .map_err(|_| fail("expected a number")),
            },
            PredicateType::Bool => match value {
                Value::Bool(b) => Ok(TypedValue::Bool(*b)),
                _ => match text.trim() {
                    "1" | "true" | "TRUE" | "Y" => Ok(TypedValue::Bool(true)),
                    "0" | "false" | "FALSE" | "N" => Ok(TypedValue::Bool(false)),
                    _ => Err(fail("expected a boolean")),
                },
            },
            PredicateType::DateTime => parse_datetime(text.trim())
                .map(TypedValue::DateTime)
                .ok_or_else(|| fail("expected an ISO-8601 datetime")),
            PredicateType::Date => parse_datetime(text.trim())
                .map(|dt| TypedValue::Date(dt.date()))
                .ok_or_else(|| fail("expected an ISO-8601 date")),
            PredicateType::Unknown => match policy {
                UnknownTypePolicy::PassThrough => Ok(TypedValue::Raw(value.clone())),
                UnknownTypePolicy::Reject => Err(Error::UnsupportedPredicateType {
                    predicate: self.name.clone(),
                    type_name: self.raw_type.clone().unwrap_or_else(|| "unknown".into()),
                }),
            },
            PredicateType::String
            | PredicateType::Text
            | PredicateType::Enum
            | PredicateType::Bytes => Ok(match value {
                Value::String(s) => TypedValue::Text(s.clone()),
                other => TypedValue::Raw(other.clone()),
            }),
        }
    }
}

/// Parse every row of a JSON array response. Keys are matched case-insensitively.
pub fn parse_rows(
    data: Value,
    predicates: &[Predicate],
    policy: UnknownTypePolicy,
) -> Result<Vec<TypedRow>> {
    let by_name: HashMap<&str, &Predicate> =
        predicates.iter().map(|p| (p.name.as_str(), p)).collect();

    let rows = match data {
        Value::Array(rows) => rows,
        other => {
            return Err(Error::TypeParse {
                field: "$".into(),
                value: other.to_string(),
                message: "expected a JSON array of rows".into(),
            })
        }
    };

    rows.into_iter()
        .map(|row| {
            let fields = match row {
                Value::Object(fields) => fields,
                other => {
                    return Err(Error::TypeParse {
                        field: "$[]".into(),
                        value: other.to_string(),
                        message: "expected a JSON object".into(),
                    })
                }
            };
            let mut out = TypedRow::new();
            for (key, value) in fields {
                let typed = match by_name.get(key.to_lowercase().as_str()) {
                    Some(p) => p.parse(&value, policy)?,
                    None => TypedValue::Raw(value),
                };
                out.insert(key, typed);
            }
            Ok(out)
        })
        .collect()
}
