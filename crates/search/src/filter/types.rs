//! Field types, operators and typed scalar values

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rankforge_common::errors::{AppError, Result};
use regex_lite::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Strings accepted as numbers, in memory and in the SQL guard alike
pub const NUMBER_PATTERN: &str = r"^[-+]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][-+]?[0-9]+)?$";

/// Strings accepted as dates: `YYYY-MM-DD`, naive `YYYY-MM-DD[T ]HH:MM:SS`,
/// or RFC 3339 with an offset. Shared with the SQL guard.
pub const DATE_PATTERN: &str = r"^[0-9]{4}-[0-9]{2}-[0-9]{2}([T ][0-9]{2}:[0-9]{2}:[0-9]{2}|[Tt ][0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?([Zz]|[-+][0-9]{2}:[0-9]{2}))?$";

fn number_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(NUMBER_PATTERN).ok()).as_ref()
}

fn date_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DATE_PATTERN).ok()).as_ref()
}

/// Resolved type of a metadata field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Number,
    Date,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
        }
    }

    /// Whether `operator` may be applied to a field of this type
    pub fn allows(&self, operator: Operator) -> bool {
        match self {
            FieldType::Number | FieldType::Date => true,
            FieldType::Text | FieldType::Boolean => !operator.is_ordering(),
        }
    }

    /// Coerce a JSON value into this type, `None` when it does not fit
    pub fn coerce(&self, value: &Value) -> Option<Scalar> {
        match (self, value) {
            (FieldType::Text, Value::String(s)) => Some(Scalar::Text(s.clone())),
            (FieldType::Text, Value::Number(n)) => Some(Scalar::Text(n.to_string())),
            (FieldType::Text, Value::Bool(b)) => Some(Scalar::Text(b.to_string())),
            (FieldType::Number, Value::Number(n)) => n.as_f64().map(Scalar::Number),
            (FieldType::Number, Value::String(s)) => parse_number(s).map(Scalar::Number),
            (FieldType::Date, Value::String(s)) => parse_date(s).map(Scalar::Date),
            (FieldType::Boolean, Value::Bool(b)) => Some(Scalar::Boolean(*b)),
            (FieldType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Scalar::Boolean(true)),
                "false" => Some(Scalar::Boolean(false)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Infer a type from a filter value when the schema is silent.
    ///
    /// Strings are tried as dates, then numbers, then fall back to text.
    /// Lists resolve to the type all elements agree on, or text.
    pub fn sniff(value: &Value) -> FieldType {
        match value {
            Value::Bool(_) => FieldType::Boolean,
            Value::Number(_) => FieldType::Number,
            Value::String(s) => sniff_str(s),
            Value::Array(items) => {
                let mut types = items.iter().map(FieldType::sniff);
                match types.next() {
                    Some(first) if types.all(|t| t == first) => first,
                    _ => FieldType::Text,
                }
            }
            _ => FieldType::Text,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(FieldType::Text),
            "number" | "numeric" | "integer" | "float" => Ok(FieldType::Number),
            "date" | "datetime" | "timestamp" => Ok(FieldType::Date),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            other => Err(AppError::Configuration {
                message: format!("unknown metadata field type '{}'", other),
            }),
        }
    }
}

fn sniff_str(s: &str) -> FieldType {
    if parse_date(s).is_some() {
        FieldType::Date
    } else if parse_number(s).is_some() {
        FieldType::Number
    } else {
        FieldType::Text
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if !number_pattern().is_some_and(|re| re.is_match(s)) {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Accepts RFC 3339, `YYYY-MM-DD` and `YYYY-MM-DD HH:MM:SS` (naive times are UTC)
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if !date_pattern().is_some_and(|re| re.is_match(s)) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Comparison and membership operators of the filter language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
}

impl Operator {
    /// Parse an operator spelling; case and inner whitespace are ignored
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();

        match normalized.as_str() {
            "=" | "==" | "eq" => Some(Operator::Eq),
            "!=" | "<>" | "ne" | "neq" => Some(Operator::Ne),
            ">" | "gt" => Some(Operator::Gt),
            ">=" | "gte" => Some(Operator::Gte),
            "<" | "lt" => Some(Operator::Lt),
            "<=" | "lte" => Some(Operator::Lte),
            "in" => Some(Operator::In),
            "not in" | "not_in" | "nin" => Some(Operator::NotIn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }

    pub fn is_membership(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    pub fn is_ordering(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte)
    }

    /// Apply a comparison operator to an ordering between stored and target values
    pub(crate) fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
            Operator::In | Operator::NotIn => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter operand or stored value after coercion to its field type
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
}

impl Scalar {
    /// Ordering between two values of the same type
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (Scalar::Number(a), Scalar::Number(b)) => a.partial_cmp(b),
            (Scalar::Date(a), Scalar::Date(b)) => Some(a.cmp(b)),
            (Scalar::Boolean(a), Scalar::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Declared metadata field types; fields not listed are sniffed
#[derive(Debug, Clone, Default)]
pub struct MetadataSchema {
    fields: HashMap<String, FieldType>,
}

impl MetadataSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `search.metadata_schema` config map
    pub fn from_config(fields: &HashMap<String, String>) -> Result<Self> {
        let fields = fields
            .iter()
            .map(|(name, ty)| Ok((name.clone(), ty.parse::<FieldType>()?)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { fields })
    }

    pub fn with_field(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields.insert(name.to_string(), field_type);
        self
    }

    pub fn get(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).copied()
    }
}
