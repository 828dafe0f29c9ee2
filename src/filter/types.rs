use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::BigDecimal;
use std::str::FromStr;

use super::error::FilterError;
use crate::database::models::{Column, ColumnType};

/// Fixed operator vocabulary accepted inside a column condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "eq" | "equals" => FilterOp::Eq,
            "in" => FilterOp::In,
            "notIn" => FilterOp::NotIn,
            "contains" => FilterOp::Contains,
            "startsWith" => FilterOp::StartsWith,
            "endsWith" => FilterOp::EndsWith,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::In => "in",
            FilterOp::NotIn => "notIn",
            FilterOp::Contains => "contains",
            FilterOp::StartsWith => "startsWith",
            FilterOp::EndsWith => "endsWith",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, FilterOp::Contains | FilterOp::StartsWith | FilterOp::EndsWith)
    }

    pub fn is_range(&self) -> bool {
        matches!(self, FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte)
    }
}

/// Single column condition after validation against the model
#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: &'static Column,
    pub operator: FilterOp,
    pub data: Value,
}

/// Filter expression tree
#[derive(Debug, Clone)]
pub enum WhereExpr {
    And(Vec<WhereExpr>),
    Or(Vec<WhereExpr>),
    Not(Box<WhereExpr>),
    Condition(FilterWhereInfo),
}

impl WhereExpr {
    /// `true` when the expression has no conditions at all
    pub fn is_empty(&self) -> bool {
        match self {
            WhereExpr::And(items) => items.iter().all(WhereExpr::is_empty),
            _ => false,
        }
    }
}

/// Raw argument object, shaped like a Prisma call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryArgs {
    pub select: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub where_clause: Option<Value>,
    pub data: Option<Map<String, Value>>,
    pub order_by: Option<Value>,
    pub take: Option<i64>,
    pub skip: Option<i64>,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub max_limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOrderInfo {
    pub column: &'static Column,
    pub sort: SortDirection,
}

/// Typed positional parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null(ColumnType),
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Serialized JSON, always paired with an explicit `::jsonb` cast
    Json(String),
}

impl SqlParam {
    /// Convert a JSON value into the parameter type of `column`
    pub fn for_column(column: &Column, value: &Value) -> Result<SqlParam, FilterError> {
        if value.is_null() {
            return Ok(SqlParam::Null(column.kind));
        }
        let mismatch = || {
            FilterError::InvalidValue(format!(
                "column '{}' expects {:?}, got {}",
                column.name, column.kind, value
            ))
        };
        match column.kind {
            ColumnType::Text => value.as_str().map(|s| SqlParam::Text(s.to_string())).ok_or_else(mismatch),
            ColumnType::Integer => value.as_i64().map(SqlParam::Int).ok_or_else(mismatch),
            ColumnType::Float => value.as_f64().map(SqlParam::Float).ok_or_else(mismatch),
            ColumnType::Boolean => value.as_bool().map(SqlParam::Bool).ok_or_else(mismatch),
            ColumnType::Decimal => {
                let text = match value {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.clone(),
                    _ => return Err(mismatch()),
                };
                BigDecimal::from_str(&text).map(SqlParam::Decimal).map_err(|_| mismatch())
            }
            ColumnType::Timestamp => {
                let text = value.as_str().ok_or_else(mismatch)?;
                DateTime::parse_from_rfc3339(text)
                    .map(|ts| SqlParam::Timestamp(ts.with_timezone(&Utc)))
                    .map_err(|_| mismatch())
            }
            ColumnType::Json => Ok(SqlParam::Json(serde_json::to_string(value)?)),
        }
    }

    /// Placeholder text for parameter `index`, with the jsonb cast where needed
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            SqlParam::Json(_) | SqlParam::Null(ColumnType::Json) => format!("${}::jsonb", index),
            _ => format!("${}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Model;
    use serde_json::json;

    #[test]
    fn converts_values_by_column_type() {
        let campaign = Model::Campaign;
        let budget = campaign.column("budget").unwrap();
        assert_eq!(
            SqlParam::for_column(budget, &json!("1500.50")).unwrap(),
            SqlParam::Decimal(BigDecimal::from_str("1500.50").unwrap())
        );

        let start = campaign.column("start_date").unwrap();
        match SqlParam::for_column(start, &json!("2024-03-01T00:00:00Z")).unwrap() {
            SqlParam::Timestamp(ts) => assert_eq!(ts.to_rfc3339(), "2024-03-01T00:00:00+00:00"),
            other => panic!("unexpected {:?}", other),
        }

        let targeting = campaign.column("targeting").unwrap();
        assert_eq!(
            SqlParam::for_column(targeting, &json!({"geo": ["US"]})).unwrap(),
            SqlParam::Json("{\"geo\":[\"US\"]}".to_string())
        );
    }

    #[test]
    fn rejects_mismatched_values() {
        let name = Model::Campaign.column("name").unwrap();
        assert!(matches!(
            SqlParam::for_column(name, &json!(42)),
            Err(FilterError::InvalidValue(_))
        ));
        let probability = Model::Campaign.column("probability").unwrap();
        assert!(SqlParam::for_column(probability, &json!("ninety")).is_err());
    }

    #[test]
    fn null_keeps_column_type() {
        let targeting = Model::Campaign.column("targeting").unwrap();
        let param = SqlParam::for_column(targeting, &Value::Null).unwrap();
        assert_eq!(param, SqlParam::Null(ColumnType::Json));
        assert_eq!(param.placeholder(3), "$3::jsonb");
    }
}
