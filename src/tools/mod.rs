//! Tool implementations agents can register.

#[cfg(feature = "duckdb")]
pub mod database;

#[cfg(feature = "duckdb")]
pub use database::{database_toolkit, reset_database};
