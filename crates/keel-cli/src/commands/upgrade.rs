//! Upgrade command implementation

use anyhow::Result;
use chrono::{DateTime, Utc};
use keel_core::Migration;
use keel_migrate::{Batch, UpgradeHooks};
use tokio_util::sync::CancellationToken;

use crate::cli::GlobalArgs;
use crate::commands::common::{display_duration, open_session};

/// Execute the upgrade command
pub async fn execute(global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
    let mut session = open_session(global)?;
    let started = Utc::now();
    let mut progress = Progress::default();

    let result = session.upgrade(&mut progress, cancel).await;
    session.close();
    let summary = result?;

    log::debug!(
        "Applied {:?}, skipped {:?}",
        summary.applied,
        summary.skipped
    );
    println!(
        "Done at migration {} {}",
        session.latest_id(),
        display_duration(Utc::now() - started)
    );
    Ok(())
}

/// Prints one line per migration start, batch and completion
#[derive(Debug, Default)]
struct Progress {
    migration_started: Option<DateTime<Utc>>,
}

impl UpgradeHooks for Progress {
    fn on_start(&mut self, migration: &Migration) {
        self.migration_started = Some(Utc::now());
        println!("{}", start_line(migration));
    }

    fn on_batch(&mut self, migration: &Migration, batch: &Batch) {
        println!("{}", batch_line(migration, batch));
    }

    fn on_complete(&mut self, migration: &Migration) {
        let elapsed = self
            .migration_started
            .take()
            .map(|started| Utc::now() - started)
            .unwrap_or_else(chrono::Duration::zero);
        println!(
            "migration[{}]: Completed {}",
            migration.id(),
            display_duration(elapsed)
        );
    }
}

fn start_line(migration: &Migration) -> String {
    format!("migration[{}]: Started {:?}", migration.id(), migration.name())
}

fn batch_line(migration: &Migration, batch: &Batch) -> String {
    let mut line = format!(
        "migration[{}]: Running {} {} statement{}",
        migration.id(),
        batch.len(),
        batch.mode(),
        if batch.len() == 1 { "" } else { "s" }
    );
    if let Some(name) = batch.descriptor_set() {
        line.push_str(&format!(" with descriptor set {name:?}"));
    }
    line
}

#[cfg(test)]
#[path = "upgrade_test.rs"]
mod tests;
