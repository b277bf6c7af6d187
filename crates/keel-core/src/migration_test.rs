use super::*;
use crate::statement::{Environment, StatementType};
use tempfile::tempdir;

#[test]
fn test_slugify() {
    assert_eq!(slugify("Add Slug"), "add_slug");
    assert_eq!(slugify("  --Create users table!!  "), "create_users_table");
    assert_eq!(slugify("create-table"), "create_table");
    assert_eq!(slugify("a__b___c"), "a_b_c");
    assert_eq!(slugify("Ünïcode name"), "n_code_name");
    assert_eq!(slugify("***"), "");
}

#[test]
fn test_migration_file_name() {
    assert_eq!(migration_file_name(1, "add_slug"), "00001_add_slug.yaml");
    assert_eq!(migration_file_name(123456, "big"), "123456_big.yaml");
}

#[test]
fn test_parse_migration_id() {
    assert_eq!(parse_migration_id("00001_add_slug.yaml"), Some(1));
    assert_eq!(parse_migration_id("00042_x_y.yaml"), Some(42));
    assert_eq!(parse_migration_id("README.md"), None);
    assert_eq!(parse_migration_id("notes_1.yaml"), None);
    assert_eq!(parse_migration_id("00001_add_slug.yaml.tmp"), None);
    assert_eq!(parse_migration_id("00001.yaml"), None);
}

#[test]
fn test_migration_name_and_slug() {
    let migration = Migration::new(
        7,
        "00007_add_user_email.yaml".to_string(),
        MigrationFile::default(),
    );
    assert_eq!(migration.slug(), "add_user_email");
    assert_eq!(migration.name(), "add user email");
}

#[test]
fn test_yaml_shape() {
    let file = MigrationFile {
        upgrade: vec![
            Statement::new(
                "ALTER TABLE test ADD COLUMN slug VARCHAR",
                Environment::All,
                StatementType::Automatic,
            ),
            Statement::new(
                "INSERT INTO test (name) VALUES ('a')",
                Environment::Emulator,
                StatementType::Automatic,
            ),
        ],
        squash_id: Some(3),
        descriptor_sets: BTreeMap::from([(
            "schema".to_string(),
            DescriptorSet::new(vec![0x0a, 0x0b, 0xff]),
        )]),
    };

    let yaml = serde_yaml::to_string(&file).unwrap();
    assert!(yaml.contains("type: DDL"));
    assert!(yaml.contains("env: EMULATOR"));
    assert!(yaml.contains("squash_id: 3"));
    assert!(yaml.contains("schema: Cgv/"));

    let parsed: MigrationFile = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed, file);
}

#[test]
fn test_parse_minimal_file() {
    let yaml = "upgrade:\n  - sql: |\n      CREATE TABLE t (id BIGINT)\n";
    let file: MigrationFile = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(file.upgrade.len(), 1);
    assert_eq!(file.upgrade[0].env, Environment::All);
    assert_eq!(file.upgrade[0].statement_type, StatementType::Automatic);
    assert!(file.squash_id.is_none());
    assert!(file.descriptor_sets.is_empty());
}

#[test]
fn test_read_rejects_unknown_fields() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("00001_bad.yaml");
    fs::write(&path, "upgrade: []\ndowngrade: []\n").unwrap();
    let err = MigrationFile::read(&path, 1).unwrap_err();
    assert!(matches!(err, CoreError::InvalidMigration { .. }));
}

#[test]
fn test_read_rejects_empty_sql() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("00001_bad.yaml");
    fs::write(&path, "upgrade:\n  - sql: '   '\n").unwrap();
    let err = MigrationFile::read(&path, 1).unwrap_err();
    assert!(err.to_string().contains("sql must not be empty"));
}

#[test]
fn test_read_rejects_forward_squash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("00002_bad.yaml");
    fs::write(&path, "upgrade: []\nsquash_id: 2\n").unwrap();
    let err = MigrationFile::read(&path, 2).unwrap_err();
    assert!(err.to_string().contains("must be lower"));
}

#[test]
fn test_read_rejects_bad_base64() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("00001_bad.yaml");
    fs::write(&path, "upgrade: []\ndescriptor_sets:\n  schema: '%%%'\n").unwrap();
    assert!(MigrationFile::read(&path, 1).is_err());
}

#[test]
fn test_write_then_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("00001_init.yaml");
    let file = MigrationFile {
        upgrade: vec![Statement::new(
            "CREATE TABLE t (id BIGINT)",
            Environment::All,
            StatementType::Ddl,
        )],
        ..MigrationFile::default()
    };

    file.write(&path).unwrap();
    assert!(!path.with_extension("yaml.tmp").exists());
    assert_eq!(MigrationFile::read(&path, 1).unwrap(), file);
}
