//! CLI integration tests for db-migrator.
//!
//! These tests cover argument parsing, plan output and exit codes. None of
//! them needs a live database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Get a command for the db-migrator binary.
fn cmd() -> Command {
    Command::cargo_bin("db-migrator").unwrap()
}

const CONNECTIONS: &str = r#"
source:
  driver: mssql
  dsn: "server=tcp:127.0.0.1,1;user=sa;password=secret"
  schema: dbo
target:
  driver: postgres
  dsn: "host=127.0.0.1 port=1 user=postgres"
  schema: public
batch_size: 1000
"#;

fn config_file(tables: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(file, "{}{}", CONNECTIONS, tables).unwrap();
    file
}

const AB_TABLES: &str = r#"
tables:
  - name: b
    columns: [id, a_id]
    dependencies: [a]
  - name: a
    columns: [id]
  - name: c
    columns: [id]
    dependencies: [c]
"#;

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("recreate-config"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_recreate_config_help() {
    cmd()
        .args(["recreate-config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("db-migrator"));
}

#[test]
fn test_global_flags_in_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("--verbosity"));
}

#[test]
fn test_invalid_log_format_rejected() {
    cmd()
        .args(["--log-format", "xml", "plan"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("xml"));
}

#[test]
fn test_missing_subcommand() {
    cmd().assert().failure();
}

// =============================================================================
// Config Errors
// =============================================================================

#[test]
fn test_missing_config_file_exits_1() {
    cmd()
        .args(["--config", "/nonexistent/db-migrator.yaml", "plan"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_invalid_yaml_exits_1() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(file, "source: [this is not: valid").unwrap();
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(1);
}

#[test]
fn test_zero_batch_size_exits_1() {
    let file = config_file(AB_TABLES);
    let yaml = std::fs::read_to_string(file.path())
        .unwrap()
        .replace("batch_size: 1000", "batch_size: 0");
    std::fs::write(file.path(), yaml).unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("batch_size"));
}

#[test]
fn test_empty_table_list_exits_1() {
    let file = config_file("tables: []\n");
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("at least one table"));
}

// =============================================================================
// Plan
// =============================================================================

#[test]
fn test_plan_prints_waves() {
    let file = config_file(AB_TABLES);
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 tables in 2 waves"))
        .stdout(predicate::str::contains("Wave 1: a, c"))
        .stdout(predicate::str::contains("Wave 2: b"));
}

#[test]
fn test_dry_run_prints_plan_without_connecting() {
    let file = config_file(AB_TABLES);
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wave 2: b"))
        .stdout(predicate::str::contains("ROW_NUMBER() OVER (ORDER BY (SELECT NULL))"))
        .stdout(predicate::str::contains("__rn <= 1000"));
}

#[test]
fn test_plan_json_output() {
    let file = config_file(AB_TABLES);
    let output = cmd()
        .args(["--config", file.path().to_str().unwrap(), "--output-json", "plan"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let waves: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(waves[0]["number"], 1);
    assert_eq!(waves[0]["tables"], serde_json::json!(["a", "c"]));
    assert_eq!(waves[1]["tables"], serde_json::json!(["b"]));
}

#[test]
fn test_plan_accepts_legacy_json_config() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{
  "source": {{"dsn": "postgres://u:p@localhost/src", "schema": "public", "driver": "postgres"}},
  "target": {{"dsn": "mysql://u:p@localhost/dst", "schema": "dst", "driver": "mysql"}},
  "batchSize": 250,
  "tables": [{{"name": "a", "columns": ["id"], "dependencies": null}}]
}}"#
    )
    .unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wave 1: a"));
}

#[test]
fn test_cycle_exits_2() {
    let file = config_file(
        r#"
tables:
  - name: a
    columns: [id]
    dependencies: [b]
  - name: b
    columns: [id]
    dependencies: [a]
"#,
    );
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Circular dependency"))
        .stderr(predicate::str::contains("a, b"));
}
