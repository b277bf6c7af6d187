//! End-to-end upgrade scenarios against an emulated DuckDB instance.

use keel_core::config::ENV_EMULATOR_DIR;
use keel_core::{Environment, StatementInput};
use keel_migrate::{
    MigrateError, MigrationState, Migrations, NoopHooks, SessionOptions, UpgradeSummary,
};
use serial_test::serial;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};
use tokio_util::sync::CancellationToken;

const CONFIG: &str = "\
project_id: demo
instance_id: test
database_id: app
";

struct Project {
    _dir: TempDir,
    database: PathBuf,
    session: Migrations,
}

fn project() -> Project {
    let dir = tempdir().unwrap();
    let config = dir.path().join(".keel.yaml");
    std::fs::write(&config, CONFIG).unwrap();
    let emulator = dir.path().join("emulator");
    std::env::set_var(ENV_EMULATOR_DIR, &emulator);

    let session = Migrations::open(&config, &SessionOptions::default()).unwrap();
    Project {
        database: emulator.join("demo/test/app.duckdb"),
        _dir: dir,
        session,
    }
}

impl Project {
    async fn upgrade(&mut self) -> Result<UpgradeSummary, MigrateError> {
        self.session
            .upgrade(&mut NoopHooks, &CancellationToken::new())
            .await
    }

    async fn ledger(&mut self) -> Vec<(u32, MigrationState)> {
        self.session
            .status()
            .await
            .unwrap()
            .into_iter()
            .filter(|s| matches!(s.state, MigrationState::Completed | MigrationState::Started))
            .map(|s| (s.id, s.state))
            .collect()
    }

    /// Query the database directly, with the session's connection released
    fn query_count(&mut self, sql: &str) -> i64 {
        self.session.close();
        count(&self.database, sql)
    }
}

fn count(path: &Path, sql: &str) -> i64 {
    let conn = duckdb::Connection::open(path).unwrap();
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn sql(s: &str) -> StatementInput {
    StatementInput::sql(s)
}

#[tokio::test]
#[serial]
async fn test_upgrade_scenario() {
    let mut p = project();

    // Default template, one DDL batch
    p.session.create("", &[], None).unwrap();
    assert_eq!(p.upgrade().await.unwrap().applied, vec![1]);
    assert_eq!(p.ledger().await.len(), 1);

    // Nothing new
    let summary = p.upgrade().await.unwrap();
    assert!(summary.applied.is_empty());
    assert_eq!(summary.to, 1);

    // Two DDL statements in one migration
    p.session
        .create("add slug", &[StatementInput::template("add-column")], None)
        .unwrap();
    p.session
        .add(2, &StatementInput::template("create-index"))
        .unwrap();
    assert_eq!(p.upgrade().await.unwrap().applied, vec![2]);
    assert_eq!(p.ledger().await.len(), 2);

    p.session
        .create(
            "insert",
            &[sql("INSERT INTO test (id, name, slug) VALUES ('one', 'first', 'one')")],
            None,
        )
        .unwrap();
    p.upgrade().await.unwrap();
    assert_eq!(p.ledger().await.len(), 3);
    assert_eq!(p.query_count("SELECT COUNT(*) FROM test"), 1);

    // Cloud-only statements are filtered out in the emulator
    p.session
        .create(
            "cloud insert",
            &[sql("INSERT INTO test (id, name, slug) VALUES ('two', 'second', 'two')")
                .with_env(Environment::Cloud)],
            None,
        )
        .unwrap();
    p.upgrade().await.unwrap();
    assert_eq!(p.ledger().await.len(), 4);
    assert_eq!(p.query_count("SELECT COUNT(*) FROM test"), 1);

    p.session
        .create(
            "update",
            &[sql("UPDATE test SET name = 'updated' WHERE true")],
            None,
        )
        .unwrap();
    p.upgrade().await.unwrap();
    assert_eq!(p.ledger().await.len(), 5);
    assert_eq!(
        p.query_count("SELECT COUNT(*) FROM test WHERE name = 'updated'"),
        1
    );

    // 8 squashes 6 and 7
    p.session
        .create("six", &[sql("CREATE TABLE six (id BIGINT)")], None)
        .unwrap();
    p.session
        .create("seven", &[sql("CREATE TABLE seven (id BIGINT)")], None)
        .unwrap();
    p.session
        .create(
            "six and seven",
            &[sql("CREATE TABLE six_seven (id BIGINT)")],
            Some(6),
        )
        .unwrap();
    let summary = p.upgrade().await.unwrap();
    assert_eq!(summary.applied, vec![8]);
    let ledger = p.ledger().await;
    assert_eq!(
        ledger.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5, 8]
    );
    assert_eq!(
        p.query_count(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name IN ('six', 'seven')"
        ),
        0
    );

    // A squash whose range is already applied is skipped
    p.session
        .create("late squash", &[sql("CREATE TABLE late (id BIGINT)")], Some(5))
        .unwrap();
    let summary = p.upgrade().await.unwrap();
    assert!(summary.applied.is_empty());
    assert_eq!(summary.skipped, vec![9]);
    assert_eq!(p.ledger().await.len(), 6);

    // A failing statement leaves its row started and blocks later runs
    p.session
        .create("failure", &[sql("CREATE failure")], None)
        .unwrap();
    let err = p.upgrade().await.unwrap_err();
    assert!(matches!(err, MigrateError::BatchFailed { id: 10, index: 0, .. }));
    let ledger = p.ledger().await;
    assert_eq!(ledger.len(), 7);
    assert_eq!(ledger.last(), Some(&(10, MigrationState::Started)));

    let err = p.upgrade().await.unwrap_err();
    assert!(matches!(err, MigrateError::Incomplete { id: 10 }));

    std::env::remove_var(ENV_EMULATOR_DIR);
}

#[tokio::test]
#[serial]
async fn test_bootstrap_from_existing_schema() {
    let mut p = project();

    let err = p.session.bootstrap(None).await.unwrap_err();
    assert!(matches!(err, MigrateError::NoStatements));

    // Build a schema outside of any migration
    p.session.close();
    {
        let conn = duckdb::Connection::open(&p.database).unwrap();
        conn.execute_batch("CREATE TABLE test (id VARCHAR PRIMARY KEY, update_time TIMESTAMP)")
            .unwrap();
    }

    let migration = p.session.bootstrap(None).await.unwrap();
    assert_eq!(migration.id(), 1);
    assert_eq!(migration.statements().len(), 1);
    assert!(migration.statements()[0].sql.contains("CREATE TABLE test"));

    p.session
        .create(
            "insert",
            &[sql("INSERT INTO test (id, update_time) VALUES ('one', now())")],
            None,
        )
        .unwrap();
    p.upgrade().await.unwrap();

    let ledger = p.ledger().await;
    assert_eq!(ledger, vec![(2, MigrationState::Completed)]);

    // The ledger table itself never ends up in a baseline
    let rebooted = keel_migrate::synthesize(
        &keel_db::LiveSchema {
            statements: vec![
                "CREATE TABLE migrations(id BIGINT PRIMARY KEY)".to_string(),
                "CREATE TABLE test(id VARCHAR PRIMARY KEY)".to_string(),
            ],
            type_descriptors: None,
        },
        &p.session.config().table,
    )
    .unwrap();
    assert_eq!(rebooted.upgrade.len(), 1);

    std::env::remove_var(ENV_EMULATOR_DIR);
}
