//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::{
    DatabaseCore, DatabaseLedger, DatabaseMutation, DatabaseSchema, LedgerHead, LedgerRow,
    LiveSchema,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const LIVE_SCHEMA_SQL: &str = "
SELECT sql FROM (
    SELECT sequence_oid AS oid, sql FROM duckdb_sequences()
    WHERE database_name = current_database()
    UNION ALL
    SELECT table_oid AS oid, sql FROM duckdb_tables()
    WHERE database_name = current_database() AND NOT internal AND NOT temporary
    UNION ALL
    SELECT view_oid AS oid, sql FROM duckdb_views()
    WHERE database_name = current_database() AND NOT internal AND NOT temporary
    UNION ALL
    SELECT index_oid AS oid, sql FROM duckdb_indexes()
    WHERE database_name = current_database()
)
WHERE sql IS NOT NULL
ORDER BY oid
";

/// DuckDB database backend
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Execute SQL synchronously, returning affected rows
    fn execute_sync(&self, sql: &str) -> DbResult<usize> {
        let conn = self.lock()?;
        conn.execute(sql, [])
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql.trim())))
    }

    fn schema_change_sync(&self, statements: &[String]) -> DbResult<()> {
        let conn = self.lock()?;
        for sql in statements {
            conn.execute_batch(sql)
                .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql.trim())))?;
        }
        Ok(())
    }

    fn transaction_sync(&self, statements: &[String]) -> DbResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for sql in statements {
            tx.execute_batch(sql)
                .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql.trim())))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn live_schema_sync(&self) -> DbResult<LiveSchema> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(LIVE_SCHEMA_SQL)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut statements = Vec::new();
        for sql in rows {
            let sql = sql?;
            let sql = sql.trim().trim_end_matches(';').trim_end();
            statements.push(sql.to_string());
        }
        Ok(LiveSchema {
            statements,
            type_descriptors: None,
        })
    }

    fn table_exists_sync(&self, name: &str) -> DbResult<bool> {
        let conn = self.lock()?;

        // Handle schema-qualified names
        let (schema, table) = match name.rsplit_once('.') {
            Some((schema, table)) => (schema, table),
            None => ("main", name),
        };

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_catalog = current_database() AND table_schema = ? AND table_name = ?",
            duckdb::params![schema, table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn ledger_head_sync(&self, table: &str) -> DbResult<Option<LedgerHead>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT id, complete_time IS NOT NULL FROM {table} ORDER BY id DESC LIMIT 1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let head = match rows.next()? {
            Some(row) => {
                let id: i64 = row.get(0)?;
                let complete: bool = row.get(1)?;
                Some(LedgerHead {
                    id: ledger_id(table, id)?,
                    complete,
                })
            }
            None => None,
        };
        Ok(head)
    }

    fn insert_ledger_start_sync(&self, table: &str, id: u32) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO {table} (id, start_time) VALUES (?, now())"),
            [i64::from(id)],
        )?;
        Ok(())
    }

    fn update_ledger_complete_sync(&self, table: &str, id: u32) -> DbResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            &format!("UPDATE {table} SET complete_time = now() WHERE id = ?"),
            [i64::from(id)],
        )?;
        if updated != 1 {
            return Err(DbError::LedgerError {
                table: table.to_string(),
                message: format!("expected one row for migration {id}, updated {updated}"),
            });
        }
        Ok(())
    }

    fn ledger_rows_sync(&self, table: &str) -> DbResult<Vec<LedgerRow>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT id, epoch_us(start_time), epoch_us(complete_time) FROM {table} ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<i64>>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, start, complete) = row?;
            out.push(LedgerRow {
                id: ledger_id(table, id)?,
                start_time: ledger_time(table, start)?,
                complete_time: complete.map(|us| ledger_time(table, us)).transpose()?,
            });
        }
        Ok(out)
    }
}

fn ledger_id(table: &str, id: i64) -> DbResult<u32> {
    u32::try_from(id).map_err(|_| DbError::LedgerError {
        table: table.to_string(),
        message: format!("migration ID {id} is out of range"),
    })
}

fn ledger_time(table: &str, micros: i64) -> DbResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| DbError::LedgerError {
        table: table.to_string(),
        message: format!("timestamp {micros} is out of range"),
    })
}

impl DatabaseCore for DuckDbBackend {
    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[async_trait]
impl DatabaseSchema for DuckDbBackend {
    async fn live_schema(&self) -> DbResult<LiveSchema> {
        self.live_schema_sync()
    }

    async fn run_schema_change(
        &self,
        statements: &[String],
        type_descriptors: Option<&[u8]>,
    ) -> DbResult<()> {
        if type_descriptors.is_some() {
            return Err(DbError::NotImplemented {
                backend: self.db_type().to_string(),
                feature: "type descriptor sets".to_string(),
            });
        }
        self.schema_change_sync(statements)
    }

    async fn table_exists(&self, name: &str) -> DbResult<bool> {
        self.table_exists_sync(name)
    }
}

#[async_trait]
impl DatabaseMutation for DuckDbBackend {
    async fn run_transaction(&self, statements: &[String]) -> DbResult<()> {
        self.transaction_sync(statements)
    }

    async fn run_partitioned_update(&self, sql: &str) -> DbResult<usize> {
        self.execute_sync(sql)
    }
}

#[async_trait]
impl DatabaseLedger for DuckDbBackend {
    async fn create_ledger_table(&self, table: &str) -> DbResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n  \
             id BIGINT NOT NULL PRIMARY KEY,\n  \
             start_time TIMESTAMP NOT NULL,\n  \
             complete_time TIMESTAMP\n)"
        );
        self.schema_change_sync(&[sql])
    }

    async fn ledger_head(&self, table: &str) -> DbResult<Option<LedgerHead>> {
        self.ledger_head_sync(table)
    }

    async fn insert_ledger_start(&self, table: &str, id: u32) -> DbResult<()> {
        self.insert_ledger_start_sync(table, id)
    }

    async fn update_ledger_complete(&self, table: &str, id: u32) -> DbResult<()> {
        self.update_ledger_complete_sync(table, id)
    }

    async fn ledger_rows(&self, table: &str) -> DbResult<Vec<LedgerRow>> {
        self.ledger_rows_sync(table)
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
