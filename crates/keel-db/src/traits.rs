//! Database trait definitions
//!
//! The upgrade engine talks to the target database only through these
//! traits. Implementations must be Send + Sync for async operation.

use crate::error::DbResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Live schema of the target database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSchema {
    /// DDL statements recreating the schema, in creation order
    pub statements: Vec<String>,
    /// Serialized type descriptors, when the database has any
    pub type_descriptors: Option<Vec<u8>>,
}

/// Highest ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerHead {
    /// Migration ID
    pub id: u32,
    /// Whether `complete_time` is set
    pub complete: bool,
}

/// One ledger row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub id: u32,
    pub start_time: DateTime<Utc>,
    pub complete_time: Option<DateTime<Utc>>,
}

/// Identity of the database being migrated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub project_id: String,
    pub instance_id: String,
    pub database_id: String,
}

impl From<&keel_core::Config> for DatabaseTarget {
    fn from(config: &keel_core::Config) -> Self {
        Self {
            project_id: config.project_id.clone(),
            instance_id: config.instance_id.clone(),
            database_id: config.database_id.clone(),
        }
    }
}

/// Core database identity
pub trait DatabaseCore: Send + Sync {
    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}

/// Schema inspection and schema changes
#[async_trait]
pub trait DatabaseSchema: DatabaseCore {
    /// Current schema as DDL, plus type descriptors if any
    async fn live_schema(&self) -> DbResult<LiveSchema>;

    /// Apply one schema-change operation and wait for it to finish
    async fn run_schema_change(
        &self,
        statements: &[String],
        type_descriptors: Option<&[u8]>,
    ) -> DbResult<()>;

    /// Check if a table exists
    async fn table_exists(&self, name: &str) -> DbResult<bool>;
}

/// Data mutations
#[async_trait]
pub trait DatabaseMutation: DatabaseCore {
    /// Run all statements in one atomic read-write transaction
    async fn run_transaction(&self, statements: &[String]) -> DbResult<()>;

    /// Run one partitioned update, returning the affected row count
    async fn run_partitioned_update(&self, sql: &str) -> DbResult<usize>;
}

/// Migration ledger access
#[async_trait]
pub trait DatabaseLedger: DatabaseCore {
    /// Create the ledger table if it is missing
    async fn create_ledger_table(&self, table: &str) -> DbResult<()>;

    /// Highest ledger row, if any
    async fn ledger_head(&self, table: &str) -> DbResult<Option<LedgerHead>>;

    /// Record that migration `id` started
    async fn insert_ledger_start(&self, table: &str, id: u32) -> DbResult<()>;

    /// Record that migration `id` completed
    async fn update_ledger_complete(&self, table: &str, id: u32) -> DbResult<()>;

    /// All ledger rows in ID order
    async fn ledger_rows(&self, table: &str) -> DbResult<Vec<LedgerRow>>;
}

/// Full database abstraction used by the upgrade engine
pub trait Database: DatabaseSchema + DatabaseMutation + DatabaseLedger {}

impl<T: DatabaseSchema + DatabaseMutation + DatabaseLedger> Database for T {}

/// Provisions the target and hands out connections
#[async_trait]
pub trait Connector: Send + Sync {
    /// Create the instance if it does not exist
    async fn ensure_instance(&self, target: &DatabaseTarget) -> DbResult<()>;

    /// Create the database if it does not exist
    async fn ensure_database(&self, target: &DatabaseTarget) -> DbResult<()>;

    /// Open a connection to the target database
    async fn connect(&self, target: &DatabaseTarget) -> DbResult<Arc<dyn Database>>;
}
