//! keel-db - Database layer for Keel
//!
//! This crate provides the `Database` traits the upgrade engine runs
//! against, the `Connector` that provisions and opens targets, and their
//! DuckDB implementations.

pub mod connector;
pub mod duckdb;
pub mod error;
pub mod traits;

pub use connector::DuckDbConnector;
pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use traits::{
    Connector, Database, DatabaseCore, DatabaseLedger, DatabaseMutation, DatabaseSchema,
    DatabaseTarget, LedgerHead, LedgerRow, LiveSchema,
};
