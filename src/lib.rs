pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod quota;
pub mod runtime;
pub mod services;
pub mod testing;
pub mod types;

pub use error::{ExecuteError, TenantError};
