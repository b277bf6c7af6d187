//! Baseline migration synthesized from a live database schema.

use crate::error::{MigrateError, MigrateResult};
use keel_core::{
    is_type_bundle_ddl, DescriptorSet, Environment, MigrationFile, Statement, StatementType,
    BASELINE_SQUASH_ID,
};
use keel_db::LiveSchema;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Reserved descriptor-set name for bootstrapped type bundles
pub const BOOTSTRAP_DESCRIPTOR_SET: &str = "schema";

/// Default name of a bootstrapped migration
pub const BOOTSTRAP_NAME: &str = "init";

fn create_table_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:"?main"?\.)?"?([A-Za-z_][A-Za-z0-9_]*)"?\s*\("#,
        )
        .expect("valid regex")
    })
}

/// Whether `sql` creates the ledger table itself
pub fn is_ledger_ddl(sql: &str, ledger_table: &str) -> bool {
    create_table_name()
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .is_some_and(|name| name.as_str().eq_ignore_ascii_case(ledger_table))
}

/// Build the body of a baseline migration reproducing `schema`.
///
/// Every statement becomes a `DDL` statement for all environments. The
/// ledger table's own `CREATE TABLE` is left out.
pub fn synthesize(schema: &LiveSchema, ledger_table: &str) -> MigrateResult<MigrationFile> {
    if schema.statements.is_empty() {
        return Err(MigrateError::NoStatements);
    }

    let descriptors = schema
        .type_descriptors
        .as_ref()
        .filter(|bytes| !bytes.is_empty());

    let mut upgrade = Vec::with_capacity(schema.statements.len());
    for sql in &schema.statements {
        if is_ledger_ddl(sql, ledger_table) {
            log::debug!("Leaving ledger table {ledger_table} out of the baseline");
            continue;
        }
        let mut statement = Statement::new(sql, Environment::All, StatementType::Ddl);
        if descriptors.is_some() && is_type_bundle_ddl(sql) {
            statement = statement.with_descriptor_set(BOOTSTRAP_DESCRIPTOR_SET);
        }
        upgrade.push(statement);
    }

    let mut descriptor_sets = BTreeMap::new();
    if let Some(bytes) = descriptors {
        descriptor_sets.insert(
            BOOTSTRAP_DESCRIPTOR_SET.to_string(),
            DescriptorSet::new(bytes.clone()),
        );
    }

    Ok(MigrationFile {
        upgrade,
        squash_id: Some(BASELINE_SQUASH_ID),
        descriptor_sets,
    })
}

#[cfg(test)]
#[path = "bootstrap_test.rs"]
mod tests;
