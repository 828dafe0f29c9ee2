use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{FilterOp, FilterWhereInfo, SqlParam, WhereExpr};
use crate::database::models::{ColumnType, Model};

/// Reduced predicate: constant branches are folded before any parameter is
/// allocated, so every placeholder in the output is referenced exactly once.
#[derive(Debug)]
enum Predicate<'a> {
    True,
    False,
    Condition(&'a FilterWhereInfo),
    And(Vec<Predicate<'a>>),
    Or(Vec<Predicate<'a>>),
    Not(Box<Predicate<'a>>),
}

pub struct FilterWhere {
    param_values: Vec<SqlParam>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Parse a Prisma-like `where` object into an expression tree
    pub fn parse(model: Model, where_data: &Value) -> Result<WhereExpr, FilterError> {
        match where_data {
            Value::Null => Ok(WhereExpr::And(vec![])),
            Value::Object(obj) => Self::parse_object(model, obj),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    /// Compile an expression. Returns `None` when the predicate holds for every row.
    /// Placeholders start after `starting_param_index`.
    pub fn generate(
        expr: &WhereExpr,
        starting_param_index: usize,
    ) -> Result<(Option<String>, Vec<SqlParam>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let predicate = Self::reduce(expr);
        let sql = match predicate {
            Predicate::True => None,
            Predicate::False => Some("1=0".to_string()),
            other => Some(filter_where.render(&other)?),
        };
        Ok((sql, filter_where.param_values))
    }

    fn parse_object(model: Model, obj: &Map<String, Value>) -> Result<WhereExpr, FilterError> {
        let mut parts = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            match key.as_str() {
                "AND" => parts.push(WhereExpr::And(Self::parse_list(model, key, value)?)),
                "OR" => match value {
                    Value::Array(_) => parts.push(WhereExpr::Or(Self::parse_list(model, key, value)?)),
                    _ => {
                        return Err(FilterError::InvalidOperatorData("OR requires an array".to_string()))
                    }
                },
                "NOT" => {
                    let inner = WhereExpr::And(Self::parse_list(model, key, value)?);
                    parts.push(WhereExpr::Not(Box::new(inner)));
                }
                field => parts.push(Self::parse_field_condition(model, field, value)?),
            }
        }
        Ok(WhereExpr::And(parts))
    }

    fn parse_list(model: Model, op: &str, value: &Value) -> Result<Vec<WhereExpr>, FilterError> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Object(obj) => Self::parse_object(model, obj),
                    _ => Err(FilterError::InvalidOperatorData(format!(
                        "{} entries must be objects",
                        op
                    ))),
                })
                .collect(),
            Value::Object(obj) => Ok(vec![Self::parse_object(model, obj)?]),
            _ => Err(FilterError::InvalidOperatorData(format!(
                "{} requires an object or array",
                op
            ))),
        }
    }

    fn parse_field_condition(model: Model, field: &str, value: &Value) -> Result<WhereExpr, FilterError> {
        let column = model
            .column(field)
            .ok_or_else(|| FilterError::InvalidColumn(format!("{}.{}", model, field)))?;

        let operator_object = match value {
            Value::Object(obj) if !obj.is_empty() && obj.keys().all(|k| FilterOp::from_key(k).is_some()) => Some(obj),
            // Unknown keys on a non-JSON column are a malformed operator object
            Value::Object(obj) if column.kind != ColumnType::Json => {
                let bad = obj.keys().find(|k| FilterOp::from_key(k).is_none());
                return Err(FilterError::UnsupportedOperator(
                    bad.cloned().unwrap_or_else(|| "{}".to_string()),
                ));
            }
            _ => None,
        };

        let Some(ops) = operator_object else {
            // Implicit equality: { field: value }
            let info = Self::condition(column, FilterOp::Eq, value.clone())?;
            return Ok(WhereExpr::Condition(info));
        };

        let mut conditions = Vec::with_capacity(ops.len());
        for (op_key, op_val) in ops {
            let operator = FilterOp::from_key(op_key)
                .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
            conditions.push(WhereExpr::Condition(Self::condition(column, operator, op_val.clone())?));
        }
        Ok(WhereExpr::And(conditions))
    }

    fn condition(
        column: &'static crate::database::models::Column,
        operator: FilterOp,
        data: Value,
    ) -> Result<FilterWhereInfo, FilterError> {
        match operator {
            FilterOp::In | FilterOp::NotIn => {
                let Value::Array(values) = &data else {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{} on '{}' requires an array",
                        operator.as_str(),
                        column.name
                    )));
                };
                for v in values {
                    SqlParam::for_column(column, v)?;
                }
            }
            op if op.is_pattern() => {
                if column.kind != ColumnType::Text {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{} is only supported on text columns, '{}' is {:?}",
                        op.as_str(),
                        column.name,
                        column.kind
                    )));
                }
                if !data.is_string() {
                    return Err(FilterError::InvalidValue(format!(
                        "{} on '{}' requires a string",
                        op.as_str(),
                        column.name
                    )));
                }
            }
            op if op.is_range() => {
                if !column.kind.is_ordered() {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{} is not supported on {:?} column '{}'",
                        op.as_str(),
                        column.kind,
                        column.name
                    )));
                }
                if data.is_null() {
                    return Err(FilterError::InvalidValue(format!(
                        "{} on '{}' requires a value",
                        op.as_str(),
                        column.name
                    )));
                }
                SqlParam::for_column(column, &data)?;
            }
            _ => {
                SqlParam::for_column(column, &data)?;
            }
        }
        Ok(FilterWhereInfo { column, operator, data })
    }

    fn reduce(expr: &WhereExpr) -> Predicate<'_> {
        match expr {
            WhereExpr::Condition(info) => match (&info.operator, &info.data) {
                // No allowed values: nothing matches
                (FilterOp::In, Value::Array(values)) if values.is_empty() => Predicate::False,
                // No disallowed values: everything matches
                (FilterOp::NotIn, Value::Array(values)) if values.is_empty() => Predicate::True,
                _ => Predicate::Condition(info),
            },
            WhereExpr::And(items) => {
                let mut kept = Vec::new();
                for item in items {
                    match Self::reduce(item) {
                        Predicate::True => {}
                        Predicate::False => return Predicate::False,
                        other => kept.push(other),
                    }
                }
                match kept.len() {
                    0 => Predicate::True,
                    1 => kept.remove(0),
                    _ => Predicate::And(kept),
                }
            }
            WhereExpr::Or(items) => {
                let mut kept = Vec::new();
                for item in items {
                    match Self::reduce(item) {
                        Predicate::False => {}
                        Predicate::True => return Predicate::True,
                        other => kept.push(other),
                    }
                }
                match kept.len() {
                    0 => Predicate::False,
                    1 => kept.remove(0),
                    _ => Predicate::Or(kept),
                }
            }
            WhereExpr::Not(inner) => match Self::reduce(inner) {
                Predicate::True => Predicate::False,
                Predicate::False => Predicate::True,
                other => Predicate::Not(Box::new(other)),
            },
        }
    }

    fn render(&mut self, predicate: &Predicate<'_>) -> Result<String, FilterError> {
        match predicate {
            Predicate::True => Ok("1=1".to_string()),
            Predicate::False => Ok("1=0".to_string()),
            Predicate::Condition(info) => self.build_sql_condition(info),
            Predicate::And(items) => self.render_joined(items, " AND "),
            Predicate::Or(items) => self.render_joined(items, " OR "),
            Predicate::Not(inner) => Ok(format!("NOT ({})", self.render(inner)?)),
        }
    }

    fn render_joined(&mut self, items: &[Predicate<'_>], joiner: &str) -> Result<String, FilterError> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            parts.push(format!("({})", self.render(item)?));
        }
        Ok(parts.join(joiner))
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let column = condition.column;
        let quoted_column = format!("\"{}\"", column.name);
        match condition.operator {
            FilterOp::Eq => {
                if condition.data.is_null() {
                    Ok(format!("{} IS NULL", quoted_column))
                } else {
                    let p = self.param(SqlParam::for_column(column, &condition.data)?);
                    Ok(format!("{} = {}", quoted_column, p))
                }
            }
            FilterOp::In | FilterOp::NotIn => {
                let values = condition.data.as_array().cloned().unwrap_or_default();
                let mut placeholders = Vec::with_capacity(values.len());
                for v in &values {
                    placeholders.push(self.param(SqlParam::for_column(column, v)?));
                }
                let keyword = if condition.operator == FilterOp::In { "IN" } else { "NOT IN" };
                Ok(format!("{} {} ({})", quoted_column, keyword, placeholders.join(", ")))
            }
            FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith => {
                let raw = condition.data.as_str().unwrap_or_default();
                let escaped = escape_like(raw);
                let pattern = match condition.operator {
                    FilterOp::Contains => format!("%{}%", escaped),
                    FilterOp::StartsWith => format!("{}%", escaped),
                    _ => format!("%{}", escaped),
                };
                let p = self.param(SqlParam::Text(pattern));
                Ok(format!("{} LIKE {}", quoted_column, p))
            }
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                let symbol = match condition.operator {
                    FilterOp::Gt => ">",
                    FilterOp::Gte => ">=",
                    FilterOp::Lt => "<",
                    _ => "<=",
                };
                let p = self.param(SqlParam::for_column(column, &condition.data)?);
                Ok(format!("{} {} {}", quoted_column, symbol, p))
            }
        }
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.param_index += 1;
        let placeholder = value.placeholder(self.param_index);
        self.param_values.push(value);
        placeholder
    }
}

/// Escape LIKE metacharacters so user text only ever matches literally
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(model: Model, where_data: Value) -> (Option<String>, Vec<SqlParam>) {
        let expr = FilterWhere::parse(model, &where_data).unwrap();
        FilterWhere::generate(&expr, 0).unwrap()
    }

    #[test]
    fn implicit_equality_and_null() {
        let (sql, params) = compile(Model::Campaign, json!({ "status": "active", "agency_id": null }));
        let sql = sql.unwrap();
        assert!(sql.contains("\"status\" = $1"));
        assert!(sql.contains("\"agency_id\" IS NULL"));
        assert_eq!(params, vec![SqlParam::Text("active".into())]);
    }

    #[test]
    fn empty_in_is_always_false() {
        let (sql, params) = compile(Model::Campaign, json!({ "status": { "in": [] } }));
        assert_eq!(sql.as_deref(), Some("1=0"));
        assert!(params.is_empty());
    }

    #[test]
    fn empty_not_in_is_no_predicate() {
        let (sql, params) = compile(Model::Campaign, json!({ "status": { "notIn": [] } }));
        assert_eq!(sql, None);
        assert!(params.is_empty());
    }

    #[test]
    fn folded_branches_do_not_leave_orphan_parameters() {
        let (sql, params) = compile(
            Model::Campaign,
            json!({ "OR": [ { "status": { "in": [] } }, { "name": "Spring" } ], "id": { "notIn": [] } }),
        );
        assert_eq!(sql.as_deref(), Some("\"name\" = $1"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn parameters_are_positional_across_clauses() {
        let (sql, params) = compile(
            Model::Invoice,
            json!({
                "status": { "in": ["sent", "overdue"] },
                "amount": { "gte": 100, "lt": "5000.00" },
                "invoice_number": { "startsWith": "INV-" }
            }),
        );
        // Object keys compile in sorted order
        let sql = sql.unwrap();
        assert!(sql.contains("\"amount\" >= $1"), "{}", sql);
        assert!(sql.contains("\"amount\" < $2"), "{}", sql);
        assert!(sql.contains("\"invoice_number\" LIKE $3"), "{}", sql);
        assert!(sql.contains("\"status\" IN ($4, $5)"), "{}", sql);
        assert_eq!(params.len(), 5);
        assert_eq!(params[2], SqlParam::Text("INV-%".into()));
    }

    #[test]
    fn like_patterns_escape_metacharacters() {
        let (_, params) = compile(Model::Campaign, json!({ "name": { "contains": "50%_off\\" } }));
        assert_eq!(params, vec![SqlParam::Text("%50\\%\\_off\\\\%".into())]);
    }

    #[test]
    fn logical_operators_nest() {
        let (sql, params) = compile(
            Model::Campaign,
            json!({ "OR": [ { "status": "won" }, { "NOT": { "probability": { "lt": 90 } } } ] }),
        );
        assert_eq!(sql.as_deref(), Some("(\"status\" = $1) OR (NOT (\"probability\" < $2))"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn starting_index_offsets_placeholders() {
        let expr = FilterWhere::parse(Model::Campaign, &json!({ "id": "c1" })).unwrap();
        let (sql, _) = FilterWhere::generate(&expr, 3).unwrap();
        assert_eq!(sql.as_deref(), Some("\"id\" = $4"));
    }

    #[test]
    fn json_columns_are_cast() {
        let (sql, params) = compile(Model::Campaign, json!({ "targeting": { "geo": "US" } }));
        assert_eq!(sql.as_deref(), Some("\"targeting\" = $1::jsonb"));
        assert_eq!(params, vec![SqlParam::Json("{\"geo\":\"US\"}".into())]);
    }

    #[test]
    fn rejects_unknown_columns_and_operators() {
        assert!(matches!(
            FilterWhere::parse(Model::Campaign, &json!({ "password": "x" })),
            Err(FilterError::InvalidColumn(_))
        ));
        assert!(matches!(
            FilterWhere::parse(Model::Campaign, &json!({ "name": { "regex": ".*" } })),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            FilterWhere::parse(Model::Campaign, &json!({ "budget": { "contains": "1" } })),
            Err(FilterError::InvalidOperatorData(_))
        ));
        assert!(matches!(
            FilterWhere::parse(Model::Campaign, &json!({ "status": { "in": "active" } })),
            Err(FilterError::InvalidOperatorData(_))
        ));
    }

    #[test]
    fn not_of_vacuous_predicate_matches_nothing() {
        let (sql, _) = compile(Model::Campaign, json!({ "NOT": { "status": { "notIn": [] } } }));
        assert_eq!(sql.as_deref(), Some("1=0"));
    }
}
