use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection};
use crate::database::models::{ColumnType, Model};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `{ "created_at": "desc" }`, an array of such objects, or
    /// `"created_at desc, name"`.
    pub fn validate_and_parse(model: Model, order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        match order {
            Value::Null => Ok(vec![]),
            Value::String(s) => Self::parse_order_string(model, s),
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    out.extend(Self::validate_and_parse(model, v)?);
                }
                Ok(out)
            }
            Value::Object(obj) => {
                let mut out = Vec::with_capacity(obj.len());
                for (k, v) in obj {
                    let dir = v
                        .as_str()
                        .ok_or_else(|| FilterError::InvalidOrder(format!("direction for '{}' must be a string", k)))?;
                    out.push(Self::info(model, k, dir)?);
                }
                Ok(out)
            }
            _ => Err(FilterError::InvalidOrder("orderBy must be an object, array or string".to_string())),
        }
    }

    fn parse_order_string(model: Model, s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                out.push(Self::info(model, col, it.next().unwrap_or("asc"))?);
            }
        }
        Ok(out)
    }

    fn info(model: Model, column: &str, direction: &str) -> Result<FilterOrderInfo, FilterError> {
        let column = model
            .column(column)
            .ok_or_else(|| FilterError::InvalidColumn(format!("{}.{}", model, column)))?;
        if column.kind == ColumnType::Json {
            return Err(FilterError::InvalidOrder(format!("cannot order by JSON column '{}'", column.name)));
        }
        let sort = if direction.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else if direction.eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else {
            return Err(FilterError::InvalidOrder(format!("unknown direction '{}'", direction)));
        };
        Ok(FilterOrderInfo { column, sort })
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column.name, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
