//! JSON filter language
//!
//! Accepted shapes:
//! - `{"field": {"operator": ">=", "value": 2020}, ...}`: implicit AND
//! - `{"field": "scalar"}`: shorthand for `=`
//! - `{"$and": [ ... ]}` / `{"$or": [ ... ]}`: each element is itself a
//!   flat object or a nested group
//!
//! `null`, `{}` and `[]` mean "no filter". Errors carry a JSON path
//! rooted at `$.filter`.

use super::types::Operator;
use rankforge_common::errors::{AppError, Result};
use serde_json::{Map, Value};

pub const ROOT_PATH: &str = "$.filter";

/// Boolean connective of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    And,
    Or,
}

/// Untyped filter tree as written by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Group {
        op: BooleanOp,
        children: Vec<FilterExpr>,
    },
    Condition(Condition),
}

/// A single `field operator value` test
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
    /// Location of the value, for error reporting
    pub path: String,
}

/// Parse a filter document; `Ok(None)` means match everything
pub fn parse(value: &Value) -> Result<Option<FilterExpr>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Array(items) if items.is_empty() => Ok(None),
        Value::Object(map) => parse_object(map, ROOT_PATH).map(Some),
        _ => Err(malformed(ROOT_PATH, "filter must be an object")),
    }
}

fn parse_object(map: &Map<String, Value>, path: &str) -> Result<FilterExpr> {
    if let Some(op) = group_key(map) {
        if map.len() != 1 {
            return Err(malformed(path, "a logical group must be the only key of its object"));
        }
        let key = match op {
            BooleanOp::And => "$and",
            BooleanOp::Or => "$or",
        };
        let group_path = format!("{}.{}", path, key);
        let Some(Value::Array(items)) = map.get(key) else {
            return Err(malformed(&group_path, "expected an array of conditions"));
        };

        let children = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let item_path = format!("{}[{}]", group_path, i);
                match item {
                    Value::Object(inner) => parse_object(inner, &item_path),
                    _ => Err(malformed(&item_path, "expected an object")),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        return Ok(FilterExpr::Group { op, children });
    }

    let mut conditions = map
        .iter()
        .map(|(field, spec)| parse_condition(field, spec, path))
        .collect::<Result<Vec<_>>>()?;

    if conditions.len() == 1 {
        return Ok(conditions.remove(0));
    }
    Ok(FilterExpr::Group {
        op: BooleanOp::And,
        children: conditions,
    })
}

fn group_key(map: &Map<String, Value>) -> Option<BooleanOp> {
    if map.contains_key("$and") {
        Some(BooleanOp::And)
    } else if map.contains_key("$or") {
        Some(BooleanOp::Or)
    } else {
        None
    }
}

fn parse_condition(field: &str, spec: &Value, parent: &str) -> Result<FilterExpr> {
    let path = format!("{}.{}", parent, field);

    if field.trim().is_empty() {
        return Err(malformed(&path, "field name must not be empty"));
    }
    if field.starts_with('$') {
        return Err(malformed(&path, "unknown logical operator; expected $and or $or"));
    }

    let (operator, value, value_path) = match spec {
        Value::Object(inner) => {
            if let Some(key) = inner.keys().find(|k| *k != "operator" && *k != "value") {
                return Err(malformed(&format!("{}.{}", path, key), "unexpected key"));
            }
            let operator = match inner.get("operator") {
                Some(Value::String(raw)) => Operator::parse(raw).ok_or_else(|| {
                    malformed(
                        &format!("{}.operator", path),
                        &format!("unknown operator '{}'", raw),
                    )
                })?,
                Some(_) => return Err(malformed(&format!("{}.operator", path), "operator must be a string")),
                None => return Err(malformed(&path, "missing operator")),
            };
            let value = inner
                .get("value")
                .ok_or_else(|| malformed(&path, "missing value"))?;
            (operator, value.clone(), format!("{}.value", path))
        }
        Value::String(_) | Value::Number(_) | Value::Bool(_) => (Operator::Eq, spec.clone(), path.clone()),
        Value::Array(_) => {
            return Err(malformed(
                &path,
                "lists need an explicit operator: {\"operator\": \"IN\", \"value\": [...]}",
            ))
        }
        Value::Null => return Err(malformed(&path, "condition must not be null")),
    };

    match (&value, operator.is_membership()) {
        (Value::Array(_), true) => {}
        (_, true) => return Err(malformed(&value_path, &format!("{} requires an array value", operator))),
        (Value::Array(_), false) => {
            return Err(malformed(&value_path, &format!("{} does not accept an array value", operator)))
        }
        (Value::Null, false) | (Value::Object(_), false) => {
            return Err(malformed(&value_path, "value must be a string, number or boolean"))
        }
        _ => {}
    }

    Ok(FilterExpr::Condition(Condition {
        field: field.to_string(),
        operator,
        value,
        path: value_path,
    }))
}

pub(crate) fn malformed(path: &str, message: &str) -> AppError {
    AppError::MalformedFilter {
        path: path.to_string(),
        message: message.to_string(),
    }
}
