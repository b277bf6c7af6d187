//! Command-line tests running the `keel` binary against an emulated instance

use std::path::Path;
use std::process::{Command, Output};
use tempfile::{tempdir, TempDir};

fn keel(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_keel"))
        .args(args)
        .current_dir(dir)
        .env("KEEL_EMULATOR_DIR", dir.join("emulator"))
        .env_remove("KEEL_PROJECT_ID")
        .env_remove("KEEL_INSTANCE_ID")
        .env_remove("KEEL_DATABASE_ID")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run keel")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn ok(dir: &Path, args: &[&str]) -> String {
    let output = keel(dir, args);
    assert!(
        output.status.success(),
        "keel {args:?} failed: {}",
        stderr(&output)
    );
    stdout(&output)
}

fn initialized() -> TempDir {
    let dir = tempdir().unwrap();
    ok(
        dir.path(),
        &["init", "-p", "demo", "-i", "test", "-d", "app"],
    );
    dir
}

#[test]
fn test_init_writes_config() {
    let dir = initialized();
    let config = std::fs::read_to_string(dir.path().join(".keel.yaml")).unwrap();
    assert!(config.contains("project_id: demo"));
    assert!(config.contains("table: migrations"));
    assert!(dir.path().join("migrations").is_dir());
    assert!(dir.path().join("emulator/demo/test/app.duckdb").is_file());

    let again = keel(dir.path(), &["init", "-p", "demo", "-i", "test", "-d", "app"]);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("already exists"));
}

#[test]
fn test_create_add_upgrade_status() {
    let dir = initialized();

    let path = ok(dir.path(), &["create", "create table"]);
    assert_eq!(path.trim(), "migrations/00001_create_table.yaml");

    ok(dir.path(), &["add", "-t", "add-column"]);
    ok(
        dir.path(),
        &["add", "-m", "1", "-s", "INSERT INTO test (id, name) VALUES ('one', 'first')"],
    );

    let upgrade = ok(dir.path(), &["upgrade"]);
    let lines: Vec<_> = upgrade.lines().collect();
    assert_eq!(lines[0], "migration[1]: Started \"create table\"");
    assert_eq!(lines[1], "migration[1]: Running 2 DDL statements");
    assert_eq!(lines[2], "migration[1]: Running 1 DML statement");
    assert!(lines[3].starts_with("migration[1]: Completed "));
    assert!(lines[4].starts_with("Done at migration 1 "));

    let again = ok(dir.path(), &["up"]);
    assert!(again.starts_with("Done at migration 1 "));

    ok(dir.path(), &["create", "pending", "-t", "drop-column"]);
    let status = ok(dir.path(), &["status", "-o", "json"]);
    let json: serde_json::Value = serde_json::from_str(&status).unwrap();
    assert_eq!(json[0]["state"], "completed");
    assert_eq!(json[1]["state"], "pending");
    assert_eq!(json[1]["name"], "pending");
}

#[test]
fn test_failed_upgrade_exits_non_zero() {
    let dir = initialized();
    ok(dir.path(), &["create", "broken", "-s", "CREATE failure"]);

    let output = keel(dir.path(), &["upgrade"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("M004"));

    let output = keel(dir.path(), &["upgrade"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Migration 1 is incomplete"));
}

#[test]
fn test_squash_rules_are_enforced() {
    let dir = initialized();
    ok(dir.path(), &["create", "one"]);
    ok(dir.path(), &["create", "two", "-t", "add-column"]);
    ok(dir.path(), &["create", "squash", "--squash", "1"]);

    let output = keel(dir.path(), &["create", "nested", "--squash", "3"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("squash 1 instead"));

    let output = keel(dir.path(), &["create", "missing", "--squash", "9"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Migration 9 not found"));
}

#[test]
fn test_add_descriptors() {
    let dir = initialized();
    ok(dir.path(), &["create", "types"]);
    std::fs::write(dir.path().join("types.pb"), [0x0a, 0x00]).unwrap();

    let path = ok(dir.path(), &["add-descriptors", "types", "types.pb"]);
    let yaml = std::fs::read_to_string(dir.path().join(path.trim())).unwrap();
    assert!(yaml.contains("descriptor_sets:"));
    assert!(yaml.contains("CgA="));
}

#[test]
fn test_listing_commands() {
    let dir = tempdir().unwrap();
    let templates = ok(dir.path(), &["templates"]);
    assert!(templates.contains("create-table (default)"));

    let envs = ok(dir.path(), &["environments"]);
    assert_eq!(envs, "ALL (default)\nCLOUD\nEMULATOR\n");
}

#[test]
fn test_missing_identifiers_are_reported() {
    let dir = tempdir().unwrap();
    let output = keel(dir.path(), &["create", "x"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("project ID required"));
}
