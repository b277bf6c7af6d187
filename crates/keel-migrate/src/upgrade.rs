//! Upgrade engine.
//!
//! Replays every migration newer than the ledger head, in ID order. Each
//! migration gets a ledger row when it starts and has `complete_time` set
//! once all of its batches succeed. Any failure in between leaves the row
//! started, which the next run reports as an incomplete migration.
//!
//! Squashes are resolved while walking IDs: when the squash index maps the
//! current ID to a later migration, the walk jumps straight to it, and a
//! migration whose squash marker does not match where the walk started is
//! skipped without touching the ledger.

use crate::batch::{plan_batches, Batch};
use crate::error::{MigrateError, MigrateResult};
use keel_core::{ExecutionEnvironment, ExecutionMode, Migration, MigrationStore};
use keel_db::{Database, DbError};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Progress callbacks. They observe the upgrade and cannot alter it.
pub trait UpgradeHooks: Send {
    /// A migration is about to start
    fn on_start(&mut self, _migration: &Migration) {}

    /// A batch is about to run
    fn on_batch(&mut self, _migration: &Migration, _batch: &Batch) {}

    /// A migration completed
    fn on_complete(&mut self, _migration: &Migration) {}
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl UpgradeHooks for NoopHooks {}

/// Outcome of an upgrade run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpgradeSummary {
    /// Ledger head before the run (0 when empty)
    pub from: u32,
    /// Highest ID the run reached
    pub to: u32,
    /// Migrations applied, in order
    pub applied: Vec<u32>,
    /// Migrations passed over because a squash supersedes them
    pub skipped: Vec<u32>,
}

/// One upgrade run against a connected database
pub struct Upgrader<'a> {
    store: &'a MigrationStore,
    db: &'a dyn Database,
    table: &'a str,
    environment: ExecutionEnvironment,
    cancel: &'a CancellationToken,
}

impl<'a> Upgrader<'a> {
    pub fn new(
        store: &'a MigrationStore,
        db: &'a dyn Database,
        table: &'a str,
        environment: ExecutionEnvironment,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            store,
            db,
            table,
            environment,
            cancel,
        }
    }

    /// Ensure the ledger table, check the head, and apply pending migrations
    pub async fn run(&self, hooks: &mut dyn UpgradeHooks) -> MigrateResult<UpgradeSummary> {
        self.checkpoint()?;
        if !self.db.table_exists(self.table).await? {
            log::info!("Creating ledger table {}", self.table);
            self.checkpoint()?;
            self.db.create_ledger_table(self.table).await?;
        }

        self.checkpoint()?;
        let current = match self.db.ledger_head(self.table).await? {
            Some(head) if !head.complete => return Err(MigrateError::Incomplete { id: head.id }),
            Some(head) => head.id,
            None => 0,
        };

        let latest = self.store.latest_id();
        let mut summary = UpgradeSummary {
            from: current,
            to: current,
            ..UpgradeSummary::default()
        };
        log::debug!("Ledger at {current}, latest migration {latest}");

        let mut id = current;
        while id < latest {
            id += 1;
            let start = id;

            if let Some(target) = self.store.squashed_by(start).filter(|t| *t > start) {
                log::debug!("Migrations {start}..{target} are squashed into {target}");
                id = target;
            }

            let migration = self.store.get(id)?;
            if let Some(squash_id) = migration.squash_id() {
                if squash_id != start {
                    log::warn!(
                        "Skipping migration {id}: it squashes from {squash_id}, not {start}"
                    );
                    summary.skipped.push(id);
                    continue;
                }
            }

            self.apply(migration, hooks).await?;
            summary.applied.push(id);
            summary.to = id;
        }

        Ok(summary)
    }

    async fn apply(
        &self,
        migration: &Migration,
        hooks: &mut dyn UpgradeHooks,
    ) -> MigrateResult<()> {
        let id = migration.id();
        hooks.on_start(migration);
        log::info!("Starting migration {id} ({})", migration.file_name());

        self.checkpoint()?;
        self.db
            .insert_ledger_start(self.table, id)
            .await
            .map_err(|source| MigrateError::Ledger {
                id,
                action: "insert",
                source,
            })?;

        for batch in plan_batches(migration.statements(), self.environment) {
            self.checkpoint()?;
            hooks.on_batch(migration, &batch);
            self.run_batch(migration, &batch).await?;
        }

        self.checkpoint()?;
        self.db
            .update_ledger_complete(self.table, id)
            .await
            .map_err(|source| MigrateError::Ledger {
                id,
                action: "complete",
                source,
            })?;

        log::info!("Completed migration {id}");
        hooks.on_complete(migration);
        Ok(())
    }

    async fn run_batch(&self, migration: &Migration, batch: &Batch) -> MigrateResult<()> {
        let id = migration.id();
        log::debug!(
            "Migration {id}: running {} {} statement(s) from upgrade[{}]",
            batch.len(),
            batch.mode(),
            batch.first_index()
        );

        let failed = |index: usize| {
            move |source: DbError| MigrateError::BatchFailed {
                id,
                index,
                mode: batch.mode(),
                source,
            }
        };

        match batch.mode() {
            ExecutionMode::Ddl => {
                let descriptors = match batch.descriptor_set() {
                    Some(name) => {
                        let set = migration.descriptor_set(name).ok_or_else(|| {
                            MigrateError::DescriptorSetNotFound {
                                id,
                                name: name.to_string(),
                            }
                        })?;
                        Some(set.as_bytes())
                    }
                    None => None,
                };
                self.db
                    .run_schema_change(&batch.sql(), descriptors)
                    .await
                    .map_err(failed(batch.first_index()))?;
            }
            ExecutionMode::Dml => {
                self.db
                    .run_transaction(&batch.sql())
                    .await
                    .map_err(failed(batch.first_index()))?;
            }
            ExecutionMode::PartitionedDml => {
                for (pos, statement) in batch.statements().iter().enumerate() {
                    let index = batch.positions()[pos];
                    if pos > 0 {
                        self.checkpoint()?;
                    }
                    let rows = self
                        .db
                        .run_partitioned_update(&statement.sql)
                        .await
                        .map_err(failed(index))?;
                    log::debug!("Migration {id}: partitioned update touched {rows} row(s)");
                }
            }
        }
        Ok(())
    }

    fn checkpoint(&self) -> MigrateResult<()> {
        if self.cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "upgrade_test.rs"]
mod tests;
