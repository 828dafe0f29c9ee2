use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterOptions, FilterOrderInfo, QueryArgs, SqlParam, WhereExpr};
use crate::database::models::{Column, Model};
use crate::types::SchemaName;

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Read-side query description for one model: selection, predicate, order, paging
pub struct Filter {
    model: Model,
    select_columns: Vec<&'static Column>,
    where_expr: WhereExpr,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
    options: FilterOptions,
}

impl Filter {
    pub fn new(model: Model, options: FilterOptions) -> Self {
        Self {
            model,
            select_columns: vec![],
            where_expr: WhereExpr::And(vec![]),
            order_data: vec![],
            limit: None,
            offset: None,
            options,
        }
    }

    pub fn assign(&mut self, args: &QueryArgs) -> Result<&mut Self, FilterError> {
        if let Some(select) = &args.select { self.select(select)?; }
        if let Some(where_clause) = &args.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = &args.order_by { self.order(order)?; }
        if args.take.is_some() || args.skip.is_some() { self.limit(args.take, args.skip)?; }
        Ok(self)
    }

    pub fn select(&mut self, columns: &[String]) -> Result<&mut Self, FilterError> {
        let mut resolved = Vec::with_capacity(columns.len());
        for name in columns {
            if name == "*" {
                resolved.clear();
                break;
            }
            let column = self
                .model
                .column(name)
                .ok_or_else(|| FilterError::InvalidColumn(format!("{}.{}", self.model, name)))?;
            resolved.push(column);
        }
        self.select_columns = resolved;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: &Value) -> Result<&mut Self, FilterError> {
        self.where_expr = FilterWhere::parse(self.model, conditions)?;
        Ok(self)
    }

    pub fn order(&mut self, order_spec: &Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(self.model, order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: Option<i64>, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if let Some(l) = limit { if l < 0 { return Err(FilterError::InvalidLimit("take must be non-negative".to_string())); } }
        if let Some(off) = offset { if off < 0 { return Err(FilterError::InvalidOffset("skip must be non-negative".to_string())); } }

        let applied_limit = match (limit, self.options.max_limit) {
            (Some(l), Some(max)) if l > max => {
                tracing::warn!("take {} exceeds max {}, capping to max", l, max);
                Some(max)
            }
            (l, _) => l,
        };

        self.limit = applied_limit;
        self.offset = offset;
        Ok(self)
    }

    pub fn has_conditions(&self) -> bool {
        !self.where_expr.is_empty()
    }

    /// `SELECT … FROM "schema"."table" [WHERE] [ORDER BY] [LIMIT] [OFFSET]`.
    /// `force_limit` overrides the configured take (used by findOne).
    pub fn to_sql(&self, schema: &SchemaName, force_limit: Option<i64>) -> Result<SqlResult, FilterError> {
        let (where_clause, mut params) = FilterWhere::generate(&self.where_expr, 0)?;
        let order_clause = FilterOrder::generate(&self.order_data);

        let mut limit_clause = String::new();
        let mut next = params.len();
        if let Some(l) = force_limit.or(self.limit) {
            next += 1;
            limit_clause.push_str(&format!("LIMIT ${}", next));
            params.push(SqlParam::Int(l));
        }
        if let Some(o) = self.offset {
            next += 1;
            if !limit_clause.is_empty() { limit_clause.push(' '); }
            limit_clause.push_str(&format!("OFFSET ${}", next));
            params.push(SqlParam::Int(o));
        }

        let query = [
            format!("SELECT {}", self.build_select_clause()),
            format!("FROM {}", schema.qualify(self.model.table())),
            where_clause.map(|w| format!("WHERE {}", w)).unwrap_or_default(),
            order_clause,
            limit_clause,
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        Ok(SqlResult { query, params })
    }

    /// Predicate only, placeholders numbered after `starting_param_index`
    pub fn to_where_sql(&self, starting_param_index: usize) -> Result<(Option<String>, Vec<SqlParam>), FilterError> {
        FilterWhere::generate(&self.where_expr, starting_param_index)
    }

    pub fn to_count_sql(&self, schema: &SchemaName) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.to_where_sql(0)?;
        let base = format!("SELECT COUNT(*)::BIGINT AS \"count\" FROM {}", schema.qualify(self.model.table()));
        let query = match where_clause {
            Some(w) => format!("{} WHERE {}", base, w),
            None => base,
        };
        Ok(SqlResult { query, params })
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() {
            "*".to_string()
        } else {
            self.select_columns.iter().map(|c| format!("\"{}\"", c.name)).collect::<Vec<_>>().join(", ")
        }
    }
}
