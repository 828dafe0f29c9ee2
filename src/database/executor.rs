use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::types::BigDecimal;
use sqlx::{Column as _, PgPool, Row};
use std::time::{Duration, Instant};

use crate::database::models::{ColumnType, Model};
use crate::database::query_builder::Statement;
use crate::filter::SqlParam;
use crate::types::Operation;

/// One row as plain structured data
pub type Record = Map<String, Value>;

/// Runs built statements. The Postgres implementation is the production path;
/// tests substitute a recording executor.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn run(&self, statement: &Statement) -> Result<Vec<Record>, sqlx::Error>;
}

/// Result of one routed operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Rows(Vec<Record>),
    Row(Option<Record>),
    Count(i64),
}

impl QueryOutput {
    pub fn from_rows(operation: Operation, mut rows: Vec<Record>) -> Self {
        match operation {
            Operation::FindOne => QueryOutput::Row(rows.into_iter().next()),
            Operation::Count => {
                let count = rows
                    .first_mut()
                    .and_then(|r| r.remove("count"))
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                QueryOutput::Count(count)
            }
            _ => QueryOutput::Rows(rows),
        }
    }

    pub fn rows(&self) -> &[Record] {
        match self {
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Row(Some(row)) => std::slice::from_ref(row),
            _ => &[],
        }
    }

    pub fn into_rows(self) -> Vec<Record> {
        match self {
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Row(row) => row.into_iter().collect(),
            QueryOutput::Count(_) => vec![],
        }
    }
}

pub struct PgExecutor {
    pool: PgPool,
    query_logging: bool,
    slow_query_threshold: Duration,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            query_logging: false,
            slow_query_threshold: Duration::from_millis(1000),
        }
    }

    pub fn with_logging(mut self, query_logging: bool, slow_query_threshold_ms: u64) -> Self {
        self.query_logging = query_logging;
        self.slow_query_threshold = Duration::from_millis(slow_query_threshold_ms);
        self
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn run(&self, statement: &Statement) -> Result<Vec<Record>, sqlx::Error> {
        if self.query_logging {
            tracing::debug!(
                schema = %statement.schema,
                model = %statement.model,
                operation = %statement.operation,
                params = statement.params.len(),
                "{}",
                statement.sql
            );
        }

        let query_start = Instant::now();
        let mut q = sqlx::query(&statement.sql);
        for param in &statement.params {
            q = bind_param(q, param);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let elapsed = query_start.elapsed();
        if elapsed > self.slow_query_threshold {
            tracing::warn!(
                schema = %statement.schema,
                model = %statement.model,
                operation = %statement.operation,
                "slow query: {}ms",
                elapsed.as_millis()
            );
        }

        rows.iter().map(|row| row_to_record(statement.model, row)).collect()
    }
}

/// Bind a typed parameter; NULLs carry their column type so Postgres sees the right type
pub fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &SqlParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        SqlParam::Null(kind) => match kind {
            ColumnType::Text | ColumnType::Json => q.bind(None::<String>),
            ColumnType::Integer => q.bind(None::<i64>),
            ColumnType::Float => q.bind(None::<f64>),
            ColumnType::Decimal => q.bind(None::<BigDecimal>),
            ColumnType::Boolean => q.bind(None::<bool>),
            ColumnType::Timestamp => q.bind(None::<DateTime<Utc>>),
        },
        SqlParam::Bool(b) => q.bind(*b),
        SqlParam::Int(i) => q.bind(*i),
        SqlParam::Float(f) => q.bind(*f),
        SqlParam::Decimal(d) => q.bind(d.clone()),
        SqlParam::Text(s) => q.bind(s.clone()),
        SqlParam::Timestamp(ts) => q.bind(*ts),
        SqlParam::Json(s) => q.bind(s.clone()),
    }
}

/// Convert a database row to JSON using the model's declared column types
fn row_to_record(model: Model, row: &PgRow) -> Result<Record, sqlx::Error> {
    let mut record = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let value = match model.column(name) {
            Some(col) => extract_column_value(row, i, col.kind)?,
            None if name == "count" => row.try_get::<Option<i64>, _>(i)?.map(Value::from).unwrap_or(Value::Null),
            None => {
                tracing::warn!("Column '{}' is not declared on {}, falling back to text", name, model);
                row.try_get::<Option<String>, _>(i).ok().flatten().map(Value::String).unwrap_or(Value::Null)
            }
        };
        record.insert(name.to_string(), value);
    }
    Ok(record)
}

fn extract_column_value(row: &PgRow, index: usize, kind: ColumnType) -> Result<Value, sqlx::Error> {
    let value = match kind {
        ColumnType::Text => row.try_get::<Option<String>, _>(index)?.map(Value::String),
        ColumnType::Integer => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
        ColumnType::Float => row
            .try_get::<Option<f64>, _>(index)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ColumnType::Decimal => row
            .try_get::<Option<BigDecimal>, _>(index)?
            .map(|d| Value::String(d.to_string())),
        ColumnType::Boolean => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        ColumnType::Timestamp => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(|ts| Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
        ColumnType::Json => row.try_get::<Option<Value>, _>(index)?,
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn shapes_output_by_operation() {
        let rows = vec![record(json!({ "id": "a" })), record(json!({ "id": "b" }))];
        assert_eq!(QueryOutput::from_rows(Operation::Find, rows.clone()).rows().len(), 2);
        assert_eq!(
            QueryOutput::from_rows(Operation::FindOne, rows.clone()),
            QueryOutput::Row(Some(record(json!({ "id": "a" }))))
        );
        assert_eq!(QueryOutput::from_rows(Operation::FindOne, vec![]), QueryOutput::Row(None));
        assert_eq!(
            QueryOutput::from_rows(Operation::Count, vec![record(json!({ "count": 7 }))]),
            QueryOutput::Count(7)
        );
    }

    #[test]
    fn serializes_untagged() {
        assert_eq!(serde_json::to_value(QueryOutput::Count(3)).unwrap(), json!(3));
        assert_eq!(serde_json::to_value(QueryOutput::Row(None)).unwrap(), Value::Null);
    }
}
