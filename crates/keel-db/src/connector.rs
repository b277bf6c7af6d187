//! Target provisioning and connection for the DuckDB backend.
//!
//! In the emulator each instance is a directory and each database a DuckDB
//! file inside it, laid out as `{root}/{project}/{instance}/{database}.duckdb`.
//! The cloud target is a single configured DuckDB path that must already
//! exist; it is never provisioned.

use crate::duckdb::DuckDbBackend;
use crate::error::{DbError, DbResult};
use crate::traits::{Connector, Database, DatabaseTarget};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Connector for DuckDB-backed targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuckDbConnector {
    /// Locally-managed emulated instances under a root directory
    Emulator { root: PathBuf },
    /// A fixed database path (or `:memory:`)
    Cloud { path: PathBuf },
}

impl DuckDbConnector {
    /// Connector for emulated instances under `root`
    pub fn emulator(root: impl Into<PathBuf>) -> Self {
        DuckDbConnector::Emulator { root: root.into() }
    }

    /// Connector for a fixed database path
    pub fn cloud(path: impl Into<PathBuf>) -> Self {
        DuckDbConnector::Cloud { path: path.into() }
    }

    /// Directory holding the target instance's databases (emulator only)
    pub fn instance_dir(&self, target: &DatabaseTarget) -> Option<PathBuf> {
        match self {
            DuckDbConnector::Emulator { root } => {
                Some(root.join(&target.project_id).join(&target.instance_id))
            }
            DuckDbConnector::Cloud { .. } => None,
        }
    }

    /// Database file the target resolves to
    pub fn database_path(&self, target: &DatabaseTarget) -> PathBuf {
        match self {
            DuckDbConnector::Emulator { root } => root
                .join(&target.project_id)
                .join(&target.instance_id)
                .join(format!("{}.duckdb", target.database_id)),
            DuckDbConnector::Cloud { path } => path.clone(),
        }
    }
}

fn provision_error(path: &Path, source: std::io::Error) -> DbError {
    DbError::ProvisionError {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl Connector for DuckDbConnector {
    async fn ensure_instance(&self, target: &DatabaseTarget) -> DbResult<()> {
        let Some(dir) = self.instance_dir(target) else {
            return Ok(());
        };
        if dir.is_dir() {
            return Ok(());
        }
        log::info!(
            "Creating instance projects/{}/instances/{}",
            target.project_id,
            target.instance_id
        );
        std::fs::create_dir_all(&dir).map_err(|e| provision_error(&dir, e))
    }

    async fn ensure_database(&self, target: &DatabaseTarget) -> DbResult<()> {
        if matches!(self, DuckDbConnector::Cloud { .. }) {
            return Ok(());
        }
        let path = self.database_path(target);
        if path.is_file() {
            return Ok(());
        }
        log::info!("Creating database {}", path.display());
        // Opening a DuckDB file creates it.
        DuckDbBackend::from_path(&path)?;
        Ok(())
    }

    async fn connect(&self, target: &DatabaseTarget) -> DbResult<Arc<dyn Database>> {
        let path = self.database_path(target);
        log::debug!("Connecting to {}", path.display());
        // Cloud databases are never created on connect.
        if let DuckDbConnector::Cloud { .. } = self {
            if path.as_os_str() != ":memory:" && !path.is_file() {
                return Err(DbError::ConnectionError(format!(
                    "{}: database does not exist",
                    path.display()
                )));
            }
        }
        let backend = DuckDbBackend::new(&path.to_string_lossy())?;
        Ok(Arc::new(backend))
    }
}

#[cfg(test)]
#[path = "connector_test.rs"]
mod tests;
