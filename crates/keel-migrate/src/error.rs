//! Error types for the migration engine.

use keel_core::{CoreError, ExecutionMode};
use keel_db::DbError;
use thiserror::Error;

/// Migration engine errors.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// The highest ledger row was started but never completed (M001).
    #[error("[M001] Migration {id} is incomplete")]
    Incomplete { id: u32 },

    /// Bootstrap found an empty schema (M002).
    #[error("[M002] No statements")]
    NoStatements,

    /// A batch references a descriptor set its migration does not carry (M003).
    #[error("[M003] Migration {id}: descriptor set {name:?} not found")]
    DescriptorSetNotFound { id: u32, name: String },

    /// Executing a batch failed (M004).
    #[error("[M004] Migration {id} upgrade[{index}]: {mode} batch failed: {source}")]
    BatchFailed {
        id: u32,
        index: usize,
        mode: ExecutionMode,
        #[source]
        source: DbError,
    },

    /// A ledger write failed (M005).
    #[error("[M005] Migration {id}: failed to {action} ledger row: {source}")]
    Ledger {
        id: u32,
        action: &'static str,
        #[source]
        source: DbError,
    },

    /// The caller cancelled the operation (M006).
    #[error("[M006] Cancelled")]
    Cancelled,

    /// Configuration, store, or template error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database error outside a batch.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result type alias for [`MigrateError`].
pub type MigrateResult<T> = Result<T, MigrateError>;
