//! Typed filter tree: record predicate and parameterised SQL

use super::dsl::{self, BooleanOp, Condition, FilterExpr};
use super::types::{FieldType, MetadataSchema, Operator, Scalar, DATE_PATTERN, NUMBER_PATTERN};
use crate::record::Record;
use rankforge_common::db::ChunkPredicate;
use rankforge_common::errors::{AppError, Result};
use sea_orm::Value as SqlValue;
use serde_json::Value;

/// Casts that yield NULL instead of raising (see migrations/0001_chunks.sql)
const SQL_TRY_NUMBER: &str = "rankforge_try_float8";
const SQL_TRY_DATE: &str = "rankforge_try_timestamptz";

/// Resolves field types and validates operators, producing a [`CompiledFilter`]
#[derive(Debug, Clone, Default)]
pub struct FilterCompiler {
    schema: MetadataSchema,
}

impl FilterCompiler {
    pub fn new(schema: MetadataSchema) -> Self {
        Self { schema }
    }

    /// Parse and compile a JSON filter document; `None` matches everything
    pub fn compile_json(&self, filter: Option<&Value>) -> Result<CompiledFilter> {
        match filter {
            None => Ok(CompiledFilter::match_all()),
            Some(value) => self.compile(dsl::parse(value)?.as_ref()),
        }
    }

    /// Compile an already parsed expression
    pub fn compile(&self, expr: Option<&FilterExpr>) -> Result<CompiledFilter> {
        let root = expr.map(|e| self.compile_node(e)).transpose()?;
        Ok(CompiledFilter { root })
    }

    fn compile_node(&self, expr: &FilterExpr) -> Result<FilterNode> {
        match expr {
            FilterExpr::Group { op, children } => {
                let children = children
                    .iter()
                    .map(|child| self.compile_node(child))
                    .collect::<Result<Vec<_>>>()?;
                Ok(match op {
                    BooleanOp::And => FilterNode::And(children),
                    BooleanOp::Or => FilterNode::Or(children),
                })
            }
            FilterExpr::Condition(condition) => self.compile_condition(condition).map(FilterNode::Condition),
        }
    }

    fn compile_condition(&self, condition: &Condition) -> Result<TypedCondition> {
        let field_type = self
            .schema
            .get(&condition.field)
            .unwrap_or_else(|| FieldType::sniff(&condition.value));

        if !field_type.allows(condition.operator) {
            return Err(AppError::InvalidOperator {
                field: condition.field.clone(),
                operator: condition.operator.as_str().to_string(),
                inferred_type: field_type.as_str().to_string(),
            });
        }

        let coerce = |value: &Value, path: &str| {
            field_type.coerce(value).ok_or_else(|| {
                dsl::malformed(path, &format!("value is not a valid {}", field_type))
            })
        };

        let operand = match &condition.value {
            Value::Array(items) => Operand::Many(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| coerce(item, &format!("{}[{}]", condition.path, i)))
                    .collect::<Result<Vec<_>>>()?,
            ),
            value => Operand::One(coerce(value, &condition.path)?),
        };

        Ok(TypedCondition {
            field: condition.field.clone(),
            operator: condition.operator,
            field_type,
            operand,
        })
    }
}

/// A validated filter, usable in memory and as a SQL predicate
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    root: Option<FilterNode>,
}

#[derive(Debug, Clone, PartialEq)]
enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Condition(TypedCondition),
}

#[derive(Debug, Clone, PartialEq)]
struct TypedCondition {
    field: String,
    operator: Operator,
    field_type: FieldType,
    operand: Operand,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    One(Scalar),
    Many(Vec<Scalar>),
}

impl CompiledFilter {
    pub fn match_all() -> Self {
        Self { root: None }
    }

    pub fn is_match_all(&self) -> bool {
        self.root.is_none()
    }

    /// Evaluate against a record's metadata
    pub fn matches(&self, record: &Record) -> bool {
        self.root.as_ref().map_or(true, |node| node.matches(record))
    }
}

impl FilterNode {
    fn matches(&self, record: &Record) -> bool {
        match self {
            FilterNode::And(children) => children.iter().all(|c| c.matches(record)),
            FilterNode::Or(children) => children.iter().any(|c| c.matches(record)),
            FilterNode::Condition(condition) => condition.matches(record),
        }
    }
}

impl TypedCondition {
    fn matches(&self, record: &Record) -> bool {
        // Empty membership lists are decided without looking at the record
        if let Operand::Many(list) = &self.operand {
            if list.is_empty() {
                return self.operator == Operator::NotIn;
            }
        }

        // Missing or uncoercible values behave like SQL NULL
        let Some(stored) = record
            .metadata
            .get(&self.field)
            .and_then(|v| self.field_type.coerce(v))
        else {
            return false;
        };

        match &self.operand {
            Operand::Many(list) => {
                let found = list
                    .iter()
                    .any(|item| stored.compare(item) == Some(std::cmp::Ordering::Equal));
                match self.operator {
                    Operator::In => found,
                    _ => !found,
                }
            }
            Operand::One(target) => stored
                .compare(target)
                .is_some_and(|ordering| self.operator.holds(ordering)),
        }
    }
}

// ============================================================================
// SQL rendering
// ============================================================================

struct SqlWriter {
    next: usize,
    values: Vec<SqlValue>,
}

impl SqlWriter {
    fn bind(&mut self, value: SqlValue) -> String {
        let placeholder = format!("${}", self.next);
        self.next += 1;
        self.values.push(value);
        placeholder
    }
}

impl ChunkPredicate for CompiledFilter {
    fn render(&self, first: usize) -> (String, Vec<SqlValue>) {
        let mut writer = SqlWriter {
            next: first,
            values: Vec::new(),
        };
        let sql = match &self.root {
            None => "TRUE".to_string(),
            Some(node) => node.render(&mut writer),
        };
        (sql, writer.values)
    }
}

impl FilterNode {
    fn render(&self, writer: &mut SqlWriter) -> String {
        match self {
            FilterNode::And(children) if children.is_empty() => "TRUE".to_string(),
            FilterNode::Or(children) if children.is_empty() => "FALSE".to_string(),
            FilterNode::And(children) => join(children, " AND ", writer),
            FilterNode::Or(children) => join(children, " OR ", writer),
            FilterNode::Condition(condition) => condition.render(writer),
        }
    }
}

fn join(children: &[FilterNode], separator: &str, writer: &mut SqlWriter) -> String {
    let parts: Vec<String> = children.iter().map(|c| c.render(writer)).collect();
    format!("({})", parts.join(separator))
}

impl TypedCondition {
    fn render(&self, writer: &mut SqlWriter) -> String {
        if let Operand::Many(list) = &self.operand {
            if list.is_empty() {
                return if self.operator == Operator::NotIn { "TRUE" } else { "FALSE" }.to_string();
            }
        }

        let key = writer.bind(self.field.clone().into());
        let raw = format!("(c.metadata->>{})", key);
        let typed = match self.field_type {
            FieldType::Text => raw,
            FieldType::Number => format!(
                "(CASE WHEN btrim({raw}) ~ '{NUMBER_PATTERN}' THEN {SQL_TRY_NUMBER}(btrim({raw})) END)"
            ),
            FieldType::Date => format!(
                "(CASE WHEN btrim({raw}) ~ '{DATE_PATTERN}' THEN {SQL_TRY_DATE}(btrim({raw})) END)"
            ),
            FieldType::Boolean => format!(
                "(CASE WHEN lower({raw}) IN ('true', 'false') THEN lower({raw})::boolean END)"
            ),
        };

        match &self.operand {
            Operand::Many(list) => {
                let placeholders: Vec<String> = list
                    .iter()
                    .map(|item| bind_scalar(writer, item))
                    .collect();
                let keyword = if self.operator == Operator::NotIn { "NOT IN" } else { "IN" };
                format!("{} {} ({})", typed, keyword, placeholders.join(", "))
            }
            Operand::One(target) => {
                let placeholder = bind_scalar(writer, target);
                let op = match self.operator {
                    Operator::Ne => "<>",
                    other => other.as_str(),
                };
                format!("{} {} {}", typed, op, placeholder)
            }
        }
    }
}

fn bind_scalar(writer: &mut SqlWriter, scalar: &Scalar) -> String {
    match scalar {
        Scalar::Text(s) => writer.bind(s.clone().into()),
        Scalar::Number(n) => writer.bind((*n).into()),
        Scalar::Boolean(b) => writer.bind((*b).into()),
        Scalar::Date(d) => format!("{}::timestamptz", writer.bind(d.to_rfc3339().into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn record(metadata: Value) -> Record {
        let mut record = Record::new(Uuid::from_u128(1), Uuid::from_u128(100), 0, "text");
        if let Value::Object(map) = metadata {
            record.metadata = map;
        }
        record
    }

    fn compile(filter: Value) -> Result<CompiledFilter> {
        FilterCompiler::default().compile_json(Some(&filter))
    }

    #[test]
    fn test_match_all_forms() {
        let any = record(json!({}));
        for filter in [json!(null), json!({}), json!([])] {
            let compiled = compile(filter).unwrap();
            assert!(compiled.is_match_all());
            assert!(compiled.matches(&any));
        }
        assert!(FilterCompiler::default().compile_json(None).unwrap().is_match_all());
    }

    #[test]
    fn test_numeric_and_date_comparisons() {
        let filter = compile(json!({
            "year": { "operator": ">=", "value": 2020 },
            "published": { "operator": "<", "value": "2024-01-01" }
        }))
        .unwrap();

        assert!(filter.matches(&record(json!({ "year": 2021, "published": "2023-06-30" }))));
        assert!(filter.matches(&record(json!({ "year": "2020", "published": "2023-12-31T23:59:59Z" }))));
        assert!(!filter.matches(&record(json!({ "year": 2019, "published": "2023-06-30" }))));
        assert!(!filter.matches(&record(json!({ "year": 2021, "published": "2024-02-01" }))));
    }

    #[test]
    fn test_missing_field_is_false() {
        let filter = compile(json!({ "department": { "operator": "!=", "value": "legal" } })).unwrap();
        assert!(filter.matches(&record(json!({ "department": "finance" }))));
        assert!(!filter.matches(&record(json!({}))));

        let filter = compile(json!({ "tag": { "operator": "NOT IN", "value": ["x"] } })).unwrap();
        assert!(!filter.matches(&record(json!({}))));
        assert!(filter.matches(&record(json!({ "tag": "y" }))));
    }

    #[test]
    fn test_empty_membership_lists() {
        let with_tag = record(json!({ "tag": "a" }));
        let without_tag = record(json!({}));

        let empty_in = compile(json!({ "tag": { "operator": "IN", "value": [] } })).unwrap();
        assert!(!empty_in.matches(&with_tag));
        assert!(!empty_in.matches(&without_tag));

        let empty_not_in = compile(json!({ "tag": { "operator": "NOT IN", "value": [] } })).unwrap();
        assert!(empty_not_in.matches(&with_tag));
        assert!(empty_not_in.matches(&without_tag));
    }

    #[test]
    fn test_groups() {
        let filter = compile(json!({
            "$or": [
                { "department": "legal" },
                { "$and": [
                    { "year": { "operator": ">", "value": 2020 } },
                    { "tag": { "operator": "in", "value": ["ml", "ai"] } }
                ]}
            ]
        }))
        .unwrap();

        assert!(filter.matches(&record(json!({ "department": "legal" }))));
        assert!(filter.matches(&record(json!({ "year": 2022, "tag": "ai" }))));
        assert!(!filter.matches(&record(json!({ "year": 2022, "tag": "db" }))));

        let empty_or = compile(json!({ "$or": [] })).unwrap();
        assert!(!empty_or.matches(&record(json!({}))));
        let empty_and = compile(json!({ "$and": [] })).unwrap();
        assert!(empty_and.matches(&record(json!({}))));
    }

    #[test]
    fn test_invalid_operator_on_text() {
        let err = compile(json!({ "title": { "operator": ">", "value": "abc" } })).unwrap_err();
        match err {
            AppError::InvalidOperator { field, operator, inferred_type } => {
                assert_eq!(field, "title");
                assert_eq!(operator, ">");
                assert_eq!(inferred_type, "text");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_schema_overrides_sniffing() {
        let compiler = FilterCompiler::new(MetadataSchema::new().with_field("code", FieldType::Text));
        // "2023" would sniff as a number; the schema pins it to text
        let filter = compiler
            .compile_json(Some(&json!({ "code": { "operator": "=", "value": "2023" } })))
            .unwrap();
        assert!(filter.matches(&record(json!({ "code": "2023" }))));
        assert!(!filter.matches(&record(json!({ "code": "2023.0" }))));

        let err = compiler
            .compile_json(Some(&json!({ "code": { "operator": ">", "value": "2023" } })))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOperator { .. }));

        let compiler = FilterCompiler::new(MetadataSchema::new().with_field("year", FieldType::Number));
        let err = compiler
            .compile_json(Some(&json!({ "year": { "operator": ">", "value": "recent" } })))
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedFilter { ref path, .. } if path == "$.filter.year.value"));
    }

    #[test]
    fn test_sql_rendering() {
        let filter = compile(json!({
            "$or": [
                { "year": { "operator": ">=", "value": 2020 } },
                { "tag": { "operator": "IN", "value": ["a", "b"] } },
                { "tag": { "operator": "NOT IN", "value": [] } }
            ]
        }))
        .unwrap();

        let (sql, values) = filter.render(3);
        assert!(sql.starts_with('(') && sql.contains(" OR "));
        assert!(sql.contains("c.metadata->>$3"));
        assert!(sql.contains(">= $4"));
        assert!(sql.contains("IN ($6, $7)"));
        assert!(sql.ends_with("TRUE)"));
        // key, value, key, two list items
        assert_eq!(values.len(), 5);

        let (sql, values) = CompiledFilter::match_all().render(1);
        assert_eq!(sql, "TRUE");
        assert!(values.is_empty());
    }

    #[test]
    fn test_malformed_stored_dates_never_match_on_either_backend() {
        let filter = compile(json!({ "published": { "operator": ">=", "value": "2024-01-01" } })).unwrap();

        assert!(filter.matches(&record(json!({ "published": "2024-03-01" }))));
        for stored in ["2024-02-31", "2024-01-01 junk", "2024-13-01"] {
            assert!(!filter.matches(&record(json!({ "published": stored }))), "{stored}");
        }

        // The SQL guard is the anchored shared pattern, and the cast cannot raise
        let (sql, _) = filter.render(1);
        assert!(sql.contains(&format!("~ '{}'", DATE_PATTERN)));
        assert!(sql.contains("rankforge_try_timestamptz(btrim("));
        assert!(!sql.contains("::timestamptz END"));
        assert!(DATE_PATTERN.starts_with('^') && DATE_PATTERN.ends_with('$'));
    }

    #[test]
    fn test_number_guard_matches_in_memory_coercion() {
        let filter = compile(json!({ "score": { "operator": ">", "value": 0.25 } })).unwrap();
        assert!(filter.matches(&record(json!({ "score": ".5" }))));
        assert!(filter.matches(&record(json!({ "score": "5." }))));
        assert!(!filter.matches(&record(json!({ "score": "1e400" }))));

        let (sql, _) = filter.render(1);
        assert!(sql.contains(&format!("~ '{}'", NUMBER_PATTERN)));
        assert!(sql.contains("rankforge_try_float8(btrim("));
    }
}
