pub mod executor;
pub mod manager;
pub mod models;
pub mod query_builder;
pub mod schema;

pub use executor::{PgExecutor, QueryExecutor, QueryOutput, Record};
pub use manager::{DatabaseError, DatabaseManager};
pub use models::{Column, ColumnType, Model};
pub use query_builder::{QueryBuilder, Statement};
