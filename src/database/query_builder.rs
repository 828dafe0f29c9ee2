//! Compiles an operation tag plus a Prisma-like argument object into one
//! parameterized statement scoped to a single tenant schema.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::models::{Model, SYSTEM_COLUMNS};
use crate::error::TenantError;
use crate::filter::{Filter, FilterOptions, QueryArgs, SqlParam};
use crate::types::{Operation, SchemaName};

/// A statement ready to run: SQL text plus positional parameters
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub model: Model,
    pub operation: Operation,
    pub schema: SchemaName,
    /// Set when an update carries an optimistic-concurrency check
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    options: FilterOptions,
}

impl QueryBuilder {
    pub fn new(options: FilterOptions) -> Self {
        Self { options }
    }

    pub fn build(
        &self,
        schema: &SchemaName,
        model: Model,
        operation: Operation,
        args: &QueryArgs,
    ) -> Result<Statement, TenantError> {
        if args.expected_version.is_some() && operation != Operation::Update {
            return Err(TenantError::configuration(format!(
                "expectedVersion is only valid for update, not {}",
                operation
            )));
        }

        let (sql, params) = match operation {
            Operation::Find | Operation::FindOne => {
                let filter = self.filter(model, args)?;
                let force_limit = (operation == Operation::FindOne).then_some(1);
                let result = filter.to_sql(schema, force_limit)?;
                (result.query, result.params)
            }
            Operation::Count => {
                let filter = self.filter(model, args)?;
                let result = filter.to_count_sql(schema)?;
                (result.query, result.params)
            }
            Operation::Create => Self::build_insert(schema, model, args)?,
            Operation::Update => self.build_update(schema, model, args)?,
            Operation::Delete => self.build_delete(schema, model, args)?,
        };

        Ok(Statement {
            sql,
            params,
            model,
            operation,
            schema: schema.clone(),
            expected_version: args.expected_version,
        })
    }

    fn filter(&self, model: Model, args: &QueryArgs) -> Result<Filter, TenantError> {
        let mut filter = Filter::new(model, self.options.clone());
        filter.assign(args)?;
        Ok(filter)
    }

    fn build_insert(schema: &SchemaName, model: Model, args: &QueryArgs) -> Result<(String, Vec<SqlParam>), TenantError> {
        let data = Self::payload(model, Operation::Create, args)?;

        let mut columns = Vec::with_capacity(data.len() + 1);
        let mut params = Vec::with_capacity(data.len() + 1);
        if !data.contains_key("id") {
            columns.push("\"id\"".to_string());
            params.push(SqlParam::Text(Uuid::new_v4().to_string()));
        }
        for (field, value) in data {
            let column = model.require_column(field)?;
            columns.push(format!("\"{}\"", column.name));
            params.push(SqlParam::for_column(column, value)?);
        }

        let placeholders = params
            .iter()
            .enumerate()
            .map(|(i, p)| p.placeholder(i + 1))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            schema.qualify(model.table()),
            columns.join(", "),
            placeholders
        );
        Ok((sql, params))
    }

    fn build_update(&self, schema: &SchemaName, model: Model, args: &QueryArgs) -> Result<(String, Vec<SqlParam>), TenantError> {
        let data = Self::payload(model, Operation::Update, args)?;
        if data.contains_key("id") {
            return Err(TenantError::invalid_value(format!("{}.id cannot be updated", model)));
        }
        let filter = self.filter_for_write(model, Operation::Update, args)?;

        let mut set_clauses = Vec::with_capacity(data.len() + 2);
        let mut params = Vec::with_capacity(data.len());
        for (field, value) in data {
            let column = model.require_column(field)?;
            let param = SqlParam::for_column(column, value)?;
            set_clauses.push(format!("\"{}\" = {}", column.name, param.placeholder(params.len() + 1)));
            params.push(param);
        }
        set_clauses.push("\"updated_at\" = NOW()".to_string());
        if model.is_versioned() {
            set_clauses.push("\"version\" = \"version\" + 1".to_string());
        }

        let (where_clause, where_params) = filter.to_where_sql(params.len())?;
        params.extend(where_params);

        let mut predicates: Vec<String> = where_clause.into_iter().collect();
        if let Some(expected) = args.expected_version {
            if !model.is_versioned() {
                return Err(TenantError::configuration(format!("{} has no version column", model)));
            }
            params.push(SqlParam::Int(expected));
            predicates.push(format!("\"version\" = ${}", params.len()));
        }

        let mut sql = format!("UPDATE {} SET {}", schema.qualify(model.table()), set_clauses.join(", "));
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&Self::conjoin(&predicates));
        }
        sql.push_str(" RETURNING *");
        Ok((sql, params))
    }

    fn build_delete(&self, schema: &SchemaName, model: Model, args: &QueryArgs) -> Result<(String, Vec<SqlParam>), TenantError> {
        if args.data.is_some() {
            return Err(TenantError::configuration("delete does not accept data"));
        }
        let filter = self.filter_for_write(model, Operation::Delete, args)?;
        let (where_clause, params) = filter.to_where_sql(0)?;

        let mut sql = format!("DELETE FROM {}", schema.qualify(model.table()));
        if let Some(w) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&w);
        }
        sql.push_str(" RETURNING *");
        Ok((sql, params))
    }

    /// Writes must name the rows they touch
    fn filter_for_write(&self, model: Model, operation: Operation, args: &QueryArgs) -> Result<Filter, TenantError> {
        if args.order_by.is_some() || args.take.is_some() || args.skip.is_some() {
            return Err(TenantError::configuration(format!(
                "{} does not accept orderBy/take/skip",
                operation
            )));
        }
        let mut filter = Filter::new(model, self.options.clone());
        if let Some(where_clause) = &args.where_clause {
            filter.where_clause(where_clause)?;
        }
        if !filter.has_conditions() {
            return Err(TenantError::configuration(format!(
                "{} on {} requires a where clause",
                operation, model
            )));
        }
        Ok(filter)
    }

    fn payload<'a>(model: Model, operation: Operation, args: &'a QueryArgs) -> Result<&'a Map<String, Value>, TenantError> {
        let data = args
            .data
            .as_ref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| TenantError::configuration(format!("{} on {} requires data", operation, model)))?;
        if let Some(system) = data.keys().find(|k| SYSTEM_COLUMNS.contains(&k.as_str())) {
            return Err(TenantError::invalid_value(format!(
                "system column '{}' cannot be set on {}",
                system, model
            )));
        }
        Ok(data)
    }

    fn conjoin(predicates: &[String]) -> String {
        if predicates.len() == 1 {
            return predicates[0].clone();
        }
        predicates.iter().map(|p| format!("({})", p)).collect::<Vec<_>>().join(" AND ")
    }
}
