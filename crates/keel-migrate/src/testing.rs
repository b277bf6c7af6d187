//! In-memory recording backend for engine tests
//!
//! [`FakeDatabase`] records every remote call the engine makes and keeps a
//! ledger in memory. Failures can be injected by SQL substring.

use async_trait::async_trait;
use chrono::Utc;
use keel_db::{
    Connector, Database, DatabaseCore, DatabaseLedger, DatabaseMutation, DatabaseSchema,
    DatabaseTarget, DbError, DbResult, LedgerHead, LedgerRow, LiveSchema,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// One remote call observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateLedgerTable,
    LedgerStart(u32),
    LedgerComplete(u32),
    SchemaChange {
        statements: Vec<String>,
        descriptors: Option<Vec<u8>>,
    },
    Transaction(Vec<String>),
    PartitionedUpdate(String),
}

impl Call {
    /// Whether this call wrote to the ledger
    pub fn is_ledger_write(&self) -> bool {
        matches!(
            self,
            Call::CreateLedgerTable | Call::LedgerStart(_) | Call::LedgerComplete(_)
        )
    }

    /// Whether this call executed migration SQL
    pub fn is_batch(&self) -> bool {
        matches!(
            self,
            Call::SchemaChange { .. } | Call::Transaction(_) | Call::PartitionedUpdate(_)
        )
    }
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<Call>,
    ledger_table: bool,
    ledger: BTreeMap<u32, LedgerRow>,
    live_schema: LiveSchema,
    fail_on: Option<String>,
}

/// Recording database double
#[derive(Debug, Default)]
pub struct FakeDatabase {
    state: Mutex<FakeState>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake whose live schema reports `schema`
    pub fn with_live_schema(schema: LiveSchema) -> Self {
        let db = Self::new();
        db.state().live_schema = schema;
        db
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake database lock")
    }

    /// Fail any batch whose SQL contains `needle`
    pub fn fail_on(&self, needle: &str) {
        self.state().fail_on = Some(needle.to_string());
    }

    /// Stop injecting failures
    pub fn clear_failure(&self) {
        self.state().fail_on = None;
    }

    /// Seed a ledger row directly, creating the ledger table
    pub fn seed_ledger(&self, id: u32, complete: bool) {
        let mut state = self.state();
        state.ledger_table = true;
        let now = Utc::now();
        state.ledger.insert(
            id,
            LedgerRow {
                id,
                start_time: now,
                complete_time: complete.then_some(now),
            },
        );
    }

    /// Every call so far
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Forget recorded calls, keeping the ledger
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Ledger as `(id, complete)` pairs in ID order
    pub fn ledger(&self) -> Vec<(u32, bool)> {
        self.state()
            .ledger
            .values()
            .map(|row| (row.id, row.complete_time.is_some()))
            .collect()
    }

    fn record(&self, call: Call) -> DbResult<()> {
        let mut state = self.state();
        let failing = match (&state.fail_on, &call) {
            (Some(needle), Call::SchemaChange { statements, .. })
            | (Some(needle), Call::Transaction(statements)) => {
                statements.iter().any(|s| s.contains(needle.as_str()))
            }
            (Some(needle), Call::PartitionedUpdate(sql)) => sql.contains(needle.as_str()),
            _ => false,
        };
        state.calls.push(call);
        if failing {
            return Err(DbError::ExecutionError("injected failure".to_string()));
        }
        Ok(())
    }

    fn require_ledger(state: &FakeState, table: &str) -> DbResult<()> {
        if state.ledger_table {
            Ok(())
        } else {
            Err(DbError::ExecutionError(format!(
                "Table with name {table} does not exist"
            )))
        }
    }
}

impl DatabaseCore for FakeDatabase {
    fn db_type(&self) -> &'static str {
        "fake"
    }
}

#[async_trait]
impl DatabaseSchema for FakeDatabase {
    async fn live_schema(&self) -> DbResult<LiveSchema> {
        Ok(self.state().live_schema.clone())
    }

    async fn run_schema_change(
        &self,
        statements: &[String],
        type_descriptors: Option<&[u8]>,
    ) -> DbResult<()> {
        self.record(Call::SchemaChange {
            statements: statements.to_vec(),
            descriptors: type_descriptors.map(<[u8]>::to_vec),
        })
    }

    async fn table_exists(&self, _name: &str) -> DbResult<bool> {
        Ok(self.state().ledger_table)
    }
}

#[async_trait]
impl DatabaseMutation for FakeDatabase {
    async fn run_transaction(&self, statements: &[String]) -> DbResult<()> {
        self.record(Call::Transaction(statements.to_vec()))
    }

    async fn run_partitioned_update(&self, sql: &str) -> DbResult<usize> {
        self.record(Call::PartitionedUpdate(sql.to_string()))?;
        Ok(0)
    }
}

#[async_trait]
impl DatabaseLedger for FakeDatabase {
    async fn create_ledger_table(&self, _table: &str) -> DbResult<()> {
        let mut state = self.state();
        state.ledger_table = true;
        state.calls.push(Call::CreateLedgerTable);
        Ok(())
    }

    async fn ledger_head(&self, table: &str) -> DbResult<Option<LedgerHead>> {
        let state = self.state();
        Self::require_ledger(&state, table)?;
        Ok(state.ledger.values().next_back().map(|row| LedgerHead {
            id: row.id,
            complete: row.complete_time.is_some(),
        }))
    }

    async fn insert_ledger_start(&self, table: &str, id: u32) -> DbResult<()> {
        let mut state = self.state();
        Self::require_ledger(&state, table)?;
        if state.ledger.contains_key(&id) {
            return Err(DbError::ExecutionError(format!("duplicate ledger row {id}")));
        }
        state.ledger.insert(
            id,
            LedgerRow {
                id,
                start_time: Utc::now(),
                complete_time: None,
            },
        );
        state.calls.push(Call::LedgerStart(id));
        Ok(())
    }

    async fn update_ledger_complete(&self, table: &str, id: u32) -> DbResult<()> {
        let mut state = self.state();
        Self::require_ledger(&state, table)?;
        let row = state.ledger.get_mut(&id).ok_or_else(|| DbError::LedgerError {
            table: table.to_string(),
            message: format!("no row for migration {id}"),
        })?;
        row.complete_time = Some(Utc::now());
        state.calls.push(Call::LedgerComplete(id));
        Ok(())
    }

    async fn ledger_rows(&self, table: &str) -> DbResult<Vec<LedgerRow>> {
        let state = self.state();
        Self::require_ledger(&state, table)?;
        Ok(state.ledger.values().cloned().collect())
    }
}

/// Connector handing out one shared [`FakeDatabase`] and counting calls
#[derive(Debug, Default)]
pub struct FakeConnector {
    db: Arc<FakeDatabase>,
    instance_calls: AtomicUsize,
    database_calls: AtomicUsize,
    connect_calls: AtomicUsize,
}

impl FakeConnector {
    pub fn new(db: Arc<FakeDatabase>) -> Self {
        Self {
            db,
            ..Self::default()
        }
    }

    /// The shared database
    pub fn database(&self) -> &Arc<FakeDatabase> {
        &self.db
    }

    /// `(ensure_instance, ensure_database, connect)` call counts
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.instance_calls.load(Ordering::SeqCst),
            self.database_calls.load(Ordering::SeqCst),
            self.connect_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn ensure_instance(&self, _target: &DatabaseTarget) -> DbResult<()> {
        self.instance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ensure_database(&self, _target: &DatabaseTarget) -> DbResult<()> {
        self.database_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(&self, _target: &DatabaseTarget) -> DbResult<Arc<dyn Database>> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let db: Arc<dyn Database> = self.db.clone();
        Ok(db)
    }
}
