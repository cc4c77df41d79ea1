use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

static TYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\w+)").expect("static regex"));
static ENUM_VALUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'([^']*)'").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateType {
    String,
    Text,
    Int,
    Float,
    Date,
    DateTime,
    Enum,
    Bool,
    Bytes,
    Unknown,
}

impl PredicateType {
    /// Map a modeldef column type name (`varchar`, `int`, `enum`, ...).
    pub fn from_column_type(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "char" | "varchar" | "varbinary" => PredicateType::String,
            "text" | "mediumtext" | "longtext" => PredicateType::Text,
            "bigint" | "int" | "integer" | "tinyint" | "smallint" | "mediumint" => {
                PredicateType::Int
            }
            "decimal" | "float" | "double" => PredicateType::Float,
            "date" => PredicateType::Date,
            "timestamp" | "datetime" => PredicateType::DateTime,
            "enum" => PredicateType::Enum,
            "bool" | "boolean" | "bit" => PredicateType::Bool,
            "longblob" => PredicateType::Bytes,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateType::String => "string",
            PredicateType::Text => "text",
            PredicateType::Int => "int",
            PredicateType::Float => "float",
            PredicateType::Date => "date",
            PredicateType::DateTime => "datetime",
            PredicateType::Enum => "enum",
            PredicateType::Bool => "bool",
            PredicateType::Bytes => "bytes",
            PredicateType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PredicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queryable field of a request class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: PredicateType,
    pub nullable: bool,
    pub default: Option<String>,
    /// Allowed values of enum predicates, in declaration order.
    pub values: Option<Vec<String>>,
    /// Column type as reported by Space-Track, kept for unknown types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_type: Option<String>,
}

impl Predicate {
    pub fn new(name: impl Into<String>, ty: PredicateType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            default: None,
            values: None,
            raw_type: None,
        }
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut p = Self::new(name, PredicateType::Enum);
        p.values = Some(values.into_iter().map(Into::into).collect());
        p
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Predicates accepted by every request class.
pub fn rest_predicates() -> Vec<Predicate> {
    vec![
        Predicate::new("predicates", PredicateType::String),
        Predicate::enumeration("metadata", ["true", "false"]),
        Predicate::new("limit", PredicateType::String),
        Predicate::new("orderby", PredicateType::String),
        Predicate::enumeration("distinct", ["true", "false"]),
        Predicate::enumeration(
            "format",
            ["json", "xml", "html", "csv", "tle", "3le", "kvn", "stream"],
        ),
        Predicate::enumeration("emptyresult", ["show"]),
        Predicate::new("favorites", PredicateType::String),
    ]
}

#[derive(Debug, Deserialize)]
struct ModeldefField {
    #[serde(rename = "Field")]
    field: String,
    #[serde(rename = "Type")]
    column_type: String,
    #[serde(rename = "Null", default)]
    null: Option<String>,
    #[serde(rename = "Default", default)]
    default: Value,
}

/// Parse the `data` array of a modeldef response.
///
/// Unrecognised column types degrade to [`PredicateType::Unknown`] with a
/// warning; only a structurally invalid payload is an error.
pub fn parse_modeldef(data: &Value) -> Result<Vec<Predicate>> {
    let fields: Vec<ModeldefField> = serde_json::from_value(data.clone())?;
    Ok(fields.into_iter().map(parse_field).collect())
}

/// Parse a full modeldef response body (`{"controller": .., "data": [..]}`).
pub fn parse_modeldef_response(body: &Value) -> Result<Vec<Predicate>> {
    match body.get("data") {
        Some(data) => parse_modeldef(data),
        None => Err(Error::Serialization(serde::de::Error::missing_field("data"))),
    }
}

fn parse_field(field: ModeldefField) -> Predicate {
    let name = field.field.to_lowercase();
    let full_type = field.column_type;

    let type_name = TYPE_RE
        .captures(&full_type)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let ty = match type_name.as_deref().and_then(PredicateType::from_column_type) {
        Some(ty) => ty,
        None => {
            warn!(predicate = %name, column_type = %full_type, "Unknown predicate type");
            PredicateType::Unknown
        }
    };

    let values = if ty == PredicateType::Enum {
        let values: Vec<String> = ENUM_VALUE_RE
            .captures_iter(&full_type)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        if values.is_empty() {
            warn!(predicate = %name, column_type = %full_type, "Enum predicate without values");
        }
        Some(values)
    } else {
        None
    };

    let default = match field.default {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    };

    Predicate {
        name,
        ty,
        nullable: field.null.as_deref() == Some("YES"),
        default,
        values,
        raw_type: (ty == PredicateType::Unknown).then_some(full_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str, ty: &str) -> Value {
        json!({"Field": name, "Type": ty, "Null": "NO", "Default": "", "Key": "", "Extra": ""})
    }

    #[test]
    fn parses_common_column_types() {
        let data = json!([
            field("NORAD_CAT_ID", "int(10) unsigned"),
            field("EPOCH", "datetime"),
            field("TLE_LINE1", "char(71)"),
            field("MEAN_MOTION", "decimal(13,8)"),
            field("LAUNCH_DATE", "date"),
            field("COMMENT", "mediumtext"),
        ]);
        let preds = parse_modeldef(&data).unwrap();
        let types: Vec<_> = preds.iter().map(|p| (p.name.as_str(), p.ty)).collect();
        assert_eq!(
            types,
            vec![
                ("norad_cat_id", PredicateType::Int),
                ("epoch", PredicateType::DateTime),
                ("tle_line1", PredicateType::String),
                ("mean_motion", PredicateType::Float),
                ("launch_date", PredicateType::Date),
                ("comment", PredicateType::Text),
            ]
        );
    }

    #[test]
    fn enum_keeps_every_value() {
        let data = json!([field("object_type", "enum('PAYLOAD','ROCKET BODY','DEBRIS','UNKNOWN','TBA')")]);
        let preds = parse_modeldef(&data).unwrap();
        assert_eq!(
            preds[0].values.as_deref().unwrap(),
            ["PAYLOAD", "ROCKET BODY", "DEBRIS", "UNKNOWN", "TBA"]
        );
    }

    #[test]
    fn enum_with_single_or_no_value() {
        let data = json!([field("a", "enum('a')"), field("b", "enum()")]);
        let preds = parse_modeldef(&data).unwrap();
        assert_eq!(preds[0].values.as_deref().unwrap(), ["a"]);
        assert_eq!(preds[1].values.as_deref().unwrap(), Vec::<String>::new().as_slice());
    }

    #[test]
    fn unknown_types_degrade() {
        let data = json!([field("x", "geometry"), field("y", "%brokentype")]);
        let preds = parse_modeldef(&data).unwrap();
        assert!(preds.iter().all(|p| p.ty == PredicateType::Unknown));
        assert_eq!(preds[0].raw_type.as_deref(), Some("geometry"));
    }

    #[test]
    fn nullable_and_default() {
        let data = json!([
            {"Field": "DECAY", "Type": "date", "Null": "YES", "Default": null},
            {"Field": "FILE", "Type": "int", "Null": "NO", "Default": 0},
        ]);
        let preds = parse_modeldef(&data).unwrap();
        assert!(preds[0].nullable);
        assert_eq!(preds[0].default, None);
        assert!(!preds[1].nullable);
        assert_eq!(preds[1].default.as_deref(), Some("0"));
    }

    #[test]
    fn response_without_data_is_rejected() {
        let err = parse_modeldef_response(&json!({"error": "nope"})).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(!err.is_validation());
        assert!(err.to_string().contains("missing field `data`"));
        let preds = parse_modeldef_response(&json!({"controller": "basicspacedata", "data": []})).unwrap();
        assert!(preds.is_empty());
    }
}
