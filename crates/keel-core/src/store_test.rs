use super::*;
use crate::statement::{Environment, ExecutionMode, Statement, StatementType};
use tempfile::{tempdir, TempDir};

fn empty_store() -> (TempDir, MigrationStore) {
    let dir = tempdir().unwrap();
    let store = MigrationStore::load(&dir.path().join("migrations"), TemplateCatalog::builtin())
        .unwrap();
    (dir, store)
}

fn reload(store: &MigrationStore) -> MigrationStore {
    MigrationStore::load(store.dir(), TemplateCatalog::builtin()).unwrap()
}

#[test]
fn test_missing_directory_is_empty() {
    let (_dir, store) = empty_store();
    assert!(store.is_empty());
    assert_eq!(store.latest_id(), 0);
    assert!(matches!(
        store.get(1),
        Err(CoreError::MigrationNotFound { id: 1 })
    ));
}

#[test]
fn test_add_slug_scenario() {
    let (_dir, mut store) = empty_store();
    let migration = store
        .create(
            "add slug",
            &[StatementInput::sql("ALTER TABLE test ADD COLUMN slug VARCHAR")],
            None,
        )
        .unwrap();

    assert_eq!(migration.id(), 1);
    assert_eq!(migration.file_name(), "00001_add_slug.yaml");
    assert_eq!(migration.statements().len(), 1);
    let statement = &migration.statements()[0];
    assert_eq!(statement.sql, "ALTER TABLE test ADD COLUMN slug VARCHAR\n");
    assert_eq!(statement.env, Environment::All);
    assert_eq!(statement.statement_type, StatementType::Ddl);

    let path = store.dir().join("00001_add_slug.yaml");
    let content = fs::read_to_string(path).unwrap();
    assert!(content.contains("ALTER TABLE test ADD COLUMN slug VARCHAR"));
    assert!(content.contains("type: DDL"));
    assert!(content.contains("env: ALL"));
}

#[test]
fn test_ids_are_monotonic_across_reloads() {
    let (_dir, mut store) = empty_store();
    store.create("first", &[], None).unwrap();
    store.create("second", &[], None).unwrap();

    let mut reloaded = reload(&store);
    assert_eq!(reloaded.latest_id(), 2);
    let third = reloaded.create("third", &[], None).unwrap();
    assert_eq!(third.id(), 3);
}

#[test]
fn test_gaps_are_tolerated() {
    let (_dir, mut store) = empty_store();
    store.create("one", &[], None).unwrap();
    store.create("two", &[], None).unwrap();
    fs::remove_file(store.dir().join("00001_one.yaml")).unwrap();

    let mut reloaded = reload(&store);
    assert_eq!(reloaded.len(), 1);
    assert!(!reloaded.contains(1));
    assert_eq!(reloaded.create("three", &[], None).unwrap().id(), 3);
}

#[test]
fn test_empty_inputs_use_default_template() {
    let (_dir, mut store) = empty_store();
    let migration = store.create("", &[], None).unwrap();
    assert_eq!(migration.file_name(), "00001_create_table.yaml");
    assert!(migration.statements()[0].sql.contains("CREATE TABLE test"));
}

#[test]
fn test_name_falls_back_to_template_then_none() {
    let (_dir, mut store) = empty_store();
    let migration = store
        .create("", &[StatementInput::template("drop-index")], None)
        .unwrap();
    assert_eq!(migration.slug(), "drop_index");

    let migration = store
        .create("!!", &[StatementInput::sql("DROP TABLE test")], None)
        .unwrap();
    assert_eq!(migration.slug(), FALLBACK_SLUG);
}

#[test]
fn test_unknown_template_creates_nothing() {
    let (_dir, mut store) = empty_store();
    let err = store
        .create("x", &[StatementInput::template("nope")], None)
        .unwrap_err();
    assert!(matches!(err, CoreError::TemplateNotFound { .. }));
    assert!(store.is_empty());
    assert!(!store.dir().exists());
}

#[test]
fn test_squash_index_and_validation() {
    let (_dir, mut store) = empty_store();
    for name in ["a", "b", "c"] {
        store.create(name, &[], None).unwrap();
    }

    let squash = store.create("squash a", &[], Some(1)).unwrap();
    assert_eq!(squash.id(), 4);
    assert_eq!(squash.squash_id(), Some(1));
    assert_eq!(store.squashed_by(1), Some(4));

    let again = store.create("squash a again", &[], Some(1)).unwrap();
    assert_eq!(again.id(), 5);
    assert_eq!(store.squashed_by(1), Some(5));

    let err = store.create("nested", &[], Some(4)).unwrap_err();
    assert!(matches!(
        err,
        CoreError::SquashConflict { target: 4, root: 1 }
    ));

    let err = store.create("missing", &[], Some(42)).unwrap_err();
    assert!(matches!(err, CoreError::MigrationNotFound { id: 42 }));
    assert_eq!(store.latest_id(), 5);

    let reloaded = reload(&store);
    assert_eq!(reloaded.squash_index(), store.squash_index());
}

#[test]
fn test_bootstrap_baseline_cannot_be_squashed() {
    let (_dir, mut store) = empty_store();
    let baseline = MigrationFile {
        upgrade: vec![Statement::new(
            "CREATE TABLE test (id VARCHAR PRIMARY KEY)",
            Environment::All,
            StatementType::Ddl,
        )],
        squash_id: Some(BASELINE_SQUASH_ID),
        ..MigrationFile::default()
    };
    store.create_from("init", baseline).unwrap();
    store.create("next", &[], None).unwrap();

    let err = store.create("squash init", &[], Some(1)).unwrap_err();
    assert!(matches!(err, CoreError::BaselineSquash { target: 1 }));
    let message = err.to_string();
    assert!(message.contains("bootstrap baseline"));
    assert!(!message.contains("squash 0"));
    assert_eq!(store.latest_id(), 2);
}

#[test]
fn test_duplicate_ids_conflict() {
    let (_dir, mut store) = empty_store();
    store.create("one", &[], None).unwrap();
    fs::write(store.dir().join("00001_other.yaml"), "upgrade: []\n").unwrap();

    let err = MigrationStore::load(store.dir(), TemplateCatalog::builtin()).unwrap_err();
    match err {
        CoreError::DuplicateMigration { id, file1, file2 } => {
            assert_eq!(id, 1);
            assert_eq!(file1, "00001_one.yaml");
            assert_eq!(file2, "00001_other.yaml");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unrelated_files_are_skipped() {
    let (_dir, mut store) = empty_store();
    store.create("one", &[], None).unwrap();
    fs::write(store.dir().join("README.md"), "notes").unwrap();
    fs::write(store.dir().join("draft_1.yaml"), "not: a migration").unwrap();
    fs::create_dir(store.dir().join("00009_dir.yaml")).unwrap();

    let reloaded = reload(&store);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.latest_id(), 1);
}

#[test]
fn test_add_appends_and_persists() {
    let (_dir, mut store) = empty_store();
    store
        .create("seed", &[StatementInput::sql("CREATE TABLE t (id BIGINT)")], None)
        .unwrap();

    let migration = store
        .add(
            1,
            &StatementInput::sql("insert into t values (1)").with_env(Environment::Emulator),
        )
        .unwrap();
    assert_eq!(migration.statements().len(), 2);
    assert_eq!(migration.statements()[1].mode(), ExecutionMode::Dml);

    let reloaded = reload(&store);
    let migration = reloaded.get(1).unwrap();
    assert_eq!(migration.statements().len(), 2);
    assert_eq!(migration.statements()[1].env, Environment::Emulator);
    assert_eq!(migration.statements()[1].statement_type, StatementType::Dml);

    assert!(matches!(
        store.add(9, &StatementInput::sql("SELECT 1")),
        Err(CoreError::MigrationNotFound { id: 9 })
    ));
}

#[test]
fn test_add_descriptor_set() {
    let (_dir, mut store) = empty_store();
    store.create("types", &[], None).unwrap();

    let migration = store
        .add_descriptor_set(1, "users", DescriptorSet::new(vec![1, 2, 3]))
        .unwrap();
    assert_eq!(
        migration.descriptor_set("users").map(DescriptorSet::as_bytes),
        Some(&[1u8, 2, 3][..])
    );

    let reloaded = reload(&store);
    let names: Vec<_> = reloaded.get(1).unwrap().descriptor_set_names().collect();
    assert_eq!(names, vec!["users"]);

    assert!(matches!(
        store.add_descriptor_set(1, " ", DescriptorSet::default()),
        Err(CoreError::InvalidDescriptorSet { .. })
    ));
}

#[test]
fn test_invalid_file_fails_load() {
    let (_dir, mut store) = empty_store();
    store.create("one", &[], None).unwrap();
    fs::write(store.dir().join("00002_bad.yaml"), "upgrade: 5\n").unwrap();

    let err = MigrationStore::load(store.dir(), TemplateCatalog::builtin()).unwrap_err();
    assert!(matches!(err, CoreError::InvalidMigration { .. }));
}
