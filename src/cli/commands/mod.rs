pub mod audit;
pub mod bootstrap;
pub mod quota;
pub mod schema;
