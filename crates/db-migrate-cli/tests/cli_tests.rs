//! CLI integration tests for db-migrate.
//!
//! These cover argument parsing, help output, exit codes and the commands
//! that only touch the artifact tree.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a command for the db-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("db-migrate").unwrap()
}

/// Valid configuration whose artifacts live under `root`.
fn write_config(dir: &Path, root: &Path, source_engine: &str) -> PathBuf {
    let yaml = format!(
        r#"
source:
  engine: {engine}
  database: Sales
  schema_filter: [dbo]
  {engine}:
    host: 127.0.0.1
    port: 1
    database: Sales
    user: sa
    password: secret
target:
  engine: mysql
  schema: sales
  mysql:
    host: 127.0.0.1
    port: 1
    database: sales
    user: root
    password: secret
migration:
  chunk_size: 500
artifacts:
  root: "{root}"
  keep_runs: 3
"#,
        engine = source_engine,
        root = root.display()
    );
    let path = dir.join("config.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        Self::with_source("mssql")
    }

    fn with_source(engine: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("artifacts");
        let config = write_config(dir.path(), &root, engine);
        Self { dir, config }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().join("artifacts")
    }

    fn cmd(&self) -> Command {
        let mut c = cmd();
        c.arg("--config").arg(&self.config);
        c
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

const CUSTOMERS_MAPPING: &str = r#"{"source_table": "dbo.Customers", "target_table": "customers",
  "source_engine": "mssql", "target_engine": "mysql", "status": "approved",
  "columns": [
    {"source": "Id", "target": "id", "canonical_type": "INT4", "target_type": "INT",
     "nullable": false, "role": "primary_key", "auto_increment": true},
    {"source": "Name", "target": "name", "canonical_type": "TEXT", "target_type": "VARCHAR(200)"}
  ],
  "indexes": [{"name": "ix_customers_name", "columns": ["name"]}]}"#;

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("validate-mapping"))
        .stdout(predicate::str::contains("approve"))
        .stdout(predicate::str::contains("apply-schema"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("show-checkpoints"))
        .stdout(predicate::str::contains("list-engines"))
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("db-migrate"));
}

#[test]
fn test_global_flag_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_migrate_subcommand_help() {
    cmd()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--run-id"))
        .stdout(predicate::str::contains("--tables"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Argument Validation Tests
// =============================================================================

#[test]
fn test_apply_schema_requires_mode() {
    cmd()
        .args(["apply-schema", "--run-id", "run-1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--dry-run"));
}

#[test]
fn test_apply_schema_modes_conflict() {
    cmd()
        .args(["apply-schema", "--run-id", "run-1", "--dry-run", "--apply"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_approve_requires_selection() {
    cmd()
        .args(["approve", "--run-id", "run-1"])
        .assert()
        .code(2);
}

#[test]
fn test_run_id_required() {
    cmd()
        .args(["show-checkpoints"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--run-id"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    // A missing file is an I/O error, not a configuration error
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "show-checkpoints", "--run-id", "r"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "clean"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_engine_settings_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  engine: mssql").unwrap();
    writeln!(file, "target:").unwrap();
    writeln!(file, "  engine: mysql").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "clean"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source.mssql settings are required"));
}

#[test]
fn test_unknown_engine_lists_valid_names() {
    let ws = Workspace::with_source("oracle");
    ws.cmd()
        .arg("extract")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("oracle"))
        .stderr(predicate::str::contains("mssql, postgres, postgresql"));
}

// =============================================================================
// Offline Command Tests
// =============================================================================

#[test]
fn test_list_engines_needs_no_config() {
    cmd()
        .args(["--config", "does_not_exist.yaml", "list-engines"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Source engines: mssql, postgres, postgresql"))
        .stdout(predicate::str::contains("Target engines: mariadb, mysql"))
        .stdout(predicate::str::contains("Type templates:"));
}

#[test]
fn test_list_engines_json() {
    let output = cmd()
        .args(["--output-json", "list-engines"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["targets"], serde_json::json!(["mariadb", "mysql"]));
}

#[test]
fn test_show_checkpoints_empty() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["show-checkpoints", "--run-id", "run-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No checkpoints for run run-1"));
}

#[test]
fn test_show_checkpoints_lists_tables() {
    let ws = Workspace::new();
    ws.write(
        "checkpoints/run-1/orders.json",
        r#"{"table":"orders","last_offset":200,"rows_loaded":200,"updated_at":"2024-01-15T12:30:45Z"}"#,
    );
    ws.cmd()
        .args(["show-checkpoints", "--run-id", "run-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("orders: offset 200, 200 rows"));
}

#[test]
fn test_clean_keeps_newest_runs() {
    let ws = Workspace::new();
    for run in ["run-20240101-000000-aaaaaa", "run-20240102-000000-bbbbbb"] {
        ws.write(&format!("schemas/{}/Sales_schema.json", run), "{}");
        ws.write(&format!("checkpoints/{}/t.json", run), "{}");
    }

    ws.cmd()
        .args(["clean", "--keep", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed run-20240101-000000-aaaaaa"));

    assert!(!ws.root().join("schemas/run-20240101-000000-aaaaaa").exists());
    assert!(!ws.root().join("checkpoints/run-20240101-000000-aaaaaa").exists());
    assert!(ws.root().join("schemas/run-20240102-000000-bbbbbb").exists());
}

#[test]
fn test_validate_mapping_reports_problems() {
    let ws = Workspace::new();
    ws.write("mappings/run-1/draft/customers.json", CUSTOMERS_MAPPING);
    ws.write(
        "mappings/run-1/draft/orders.json",
        r#"{"source_table": "dbo.Orders", "target_table": "orders",
            "source_engine": "mssql", "target_engine": "mysql",
            "columns": [{"source": "Id", "target": "id", "canonical_type": "NOPE", "target_type": "INT"}]}"#,
    );

    ws.cmd()
        .args(["validate-mapping", "--run-id", "run-1"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("OK   customers.json"))
        .stdout(predicate::str::contains("FAIL orders.json"))
        .stdout(predicate::str::contains("unknown canonical_type 'NOPE'"));
}

#[test]
fn test_approve_then_validate_approved() {
    let ws = Workspace::new();
    ws.write("mappings/run-1/draft/customers.json", CUSTOMERS_MAPPING);

    ws.cmd()
        .args(["approve", "--run-id", "run-1", "customers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 mapping(s) approved"));

    assert!(!ws.root().join("mappings/run-1/draft/customers.json").exists());
    assert!(ws.root().join("mappings/run-1/approved/customers.json").exists());

    ws.cmd()
        .args(["validate-mapping", "--run-id", "run-1", "--approved"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 mapping document(s) valid"));
}

#[test]
fn test_apply_schema_dry_run_prints_ddl() {
    let ws = Workspace::new();
    ws.write("mappings/run-1/approved/customers.json", CUSTOMERS_MAPPING);

    ws.cmd()
        .args(["apply-schema", "--run-id", "run-1", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-- customers.sql"))
        .stdout(predicate::str::contains("CREATE TABLE IF NOT EXISTS `sales`.`customers`"))
        .stdout(predicate::str::contains("AUTO_INCREMENT"))
        .stdout(predicate::str::contains("CREATE INDEX"));

    assert!(ws.root().join("ddl/run-1/customers.sql").exists());
}

#[test]
fn test_apply_schema_without_mappings_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["apply-schema", "--run-id", "run-1", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no approved mappings for run run-1"));
}
