use super::*;
use crate::traits::{DatabaseCore, DatabaseLedger, DatabaseSchema};
use tempfile::tempdir;

fn target() -> DatabaseTarget {
    DatabaseTarget {
        project_id: "demo".to_string(),
        instance_id: "test".to_string(),
        database_id: "app".to_string(),
    }
}

#[test]
fn test_emulator_layout() {
    let connector = DuckDbConnector::emulator("/tmp/emu");
    assert_eq!(
        connector.instance_dir(&target()),
        Some(PathBuf::from("/tmp/emu/demo/test"))
    );
    assert_eq!(
        connector.database_path(&target()),
        PathBuf::from("/tmp/emu/demo/test/app.duckdb")
    );
}

#[tokio::test]
async fn test_emulator_provisions_instance_and_database() {
    let dir = tempdir().unwrap();
    let connector = DuckDbConnector::emulator(dir.path());
    let target = target();

    connector.ensure_instance(&target).await.unwrap();
    assert!(dir.path().join("demo/test").is_dir());

    connector.ensure_database(&target).await.unwrap();
    assert!(dir.path().join("demo/test/app.duckdb").is_file());

    // Idempotent
    connector.ensure_instance(&target).await.unwrap();
    connector.ensure_database(&target).await.unwrap();

    let db = connector.connect(&target).await.unwrap();
    assert_eq!(db.db_type(), "duckdb");
}

#[tokio::test]
async fn test_cloud_skips_provisioning() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cloud.duckdb");
    DuckDbBackend::from_path(&path).unwrap();
    let connector = DuckDbConnector::cloud(&path);

    assert_eq!(connector.instance_dir(&target()), None);
    connector.ensure_instance(&target()).await.unwrap();
    connector.ensure_database(&target()).await.unwrap();

    let db = connector.connect(&target()).await.unwrap();
    db.create_ledger_table("migrations").await.unwrap();
    assert!(db.table_exists("migrations").await.unwrap());
}

#[tokio::test]
async fn test_cloud_missing_database_is_not_created() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("typo.duckdb");
    let connector = DuckDbConnector::cloud(&path);

    connector.ensure_instance(&target()).await.unwrap();
    connector.ensure_database(&target()).await.unwrap();
    let err = match connector.connect(&target()).await {
        Ok(_) => panic!("connected to a missing database"),
        Err(err) => err,
    };
    assert!(matches!(err, DbError::ConnectionError(_)));
    assert!(err.to_string().contains("typo.duckdb"));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_cloud_in_memory() {
    let connector = DuckDbConnector::cloud(":memory:");
    let db = connector.connect(&target()).await.unwrap();
    assert!(!db.table_exists("migrations").await.unwrap());
}
