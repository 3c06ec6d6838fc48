//! CLI integration tests for sql-pancake
//!
//! Runs the binary end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Command isolated from the user's real configuration
#[allow(deprecated)]
fn pancake_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sql-pancake").unwrap();
    cmd.env("SQL_PANCAKE_CONFIG_DIR", config_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_create_with_template_then_list_tables() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("blog.db");

    pancake_cmd(&temp_dir)
        .args(["create", "--template", "blog"])
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("Database created"));

    pancake_cmd(&temp_dir)
        .arg("tables")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("posts").and(predicate::str::contains("comments")));
}

#[test]
fn test_create_refuses_existing_without_force() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("app.db");

    pancake_cmd(&temp_dir).arg("create").arg(&db).assert().success();

    pancake_cmd(&temp_dir)
        .arg("create")
        .arg(&db)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists").and(predicate::str::contains("--force")));

    pancake_cmd(&temp_dir)
        .args(["create", "--force"])
        .arg(&db)
        .assert()
        .success();
}

#[test]
fn test_unknown_template_fails() {
    let temp_dir = TempDir::new().unwrap();
    pancake_cmd(&temp_dir)
        .args(["create", "--template", "crm"])
        .arg(temp_dir.path().join("crm.db"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown schema template 'crm'"));
}

#[test]
fn test_query_with_params_and_json_output() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("users.db");

    pancake_cmd(&temp_dir).arg("create").arg(&db).assert().success();
    pancake_cmd(&temp_dir)
        .arg("query")
        .arg(&db)
        .arg("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)")
        .assert()
        .success();
    pancake_cmd(&temp_dir)
        .arg("query")
        .arg(&db)
        .arg("INSERT INTO users (name, age) VALUES (?, ?)")
        .args(["--param", "Ada", "--param", "36"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 rows affected"));

    let output = pancake_cmd(&temp_dir)
        .args(["--format", "json", "query"])
        .arg(&db)
        .arg("SELECT name, age FROM users WHERE age > ?")
        .args(["-p", "30"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows, serde_json::json!([{ "name": "Ada", "age": 36 }]));
}

#[test]
fn test_query_on_missing_database_fails() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("missing.db");

    pancake_cmd(&temp_dir)
        .arg("query")
        .arg(&db)
        .arg("SELECT 1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
    assert!(!db.exists(), "query must not create a database");
}

#[test]
fn test_sql_error_exits_nonzero() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("app.db");

    pancake_cmd(&temp_dir).arg("create").arg(&db).assert().success();
    pancake_cmd(&temp_dir)
        .arg("query")
        .arg(&db)
        .arg("SELEC 1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SQL error"));
}

#[test]
fn test_export_and_import() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("school.db");
    let copy = temp_dir.path().join("copy.db");
    let dump = temp_dir.path().join("school.sql");

    pancake_cmd(&temp_dir)
        .args(["create", "-t", "school"])
        .arg(&source)
        .assert()
        .success();
    pancake_cmd(&temp_dir)
        .arg("query")
        .arg(&source)
        .arg("INSERT INTO departments (code, name) VALUES ('MATH', 'Mathematics')")
        .assert()
        .success();
    pancake_cmd(&temp_dir)
        .arg("export")
        .arg(&source)
        .arg(&dump)
        .assert()
        .success()
        .stdout(predicate::str::contains("Database exported to"));

    let text = fs::read_to_string(&dump).unwrap();
    assert!(text.starts_with("PRAGMA foreign_keys=OFF;\nBEGIN TRANSACTION;\n"));
    assert!(text.trim_end().ends_with("COMMIT;"));

    pancake_cmd(&temp_dir).arg("create").arg(&copy).assert().success();
    pancake_cmd(&temp_dir)
        .arg("import")
        .arg(&copy)
        .arg(&dump)
        .assert()
        .success();
    pancake_cmd(&temp_dir)
        .arg("query")
        .arg(&copy)
        .arg("SELECT name FROM departments")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mathematics"));
}

#[test]
fn test_info_json() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("shop.db");

    pancake_cmd(&temp_dir)
        .args(["create", "--template", "ecommerce"])
        .arg(&db)
        .assert()
        .success();

    let output = pancake_cmd(&temp_dir)
        .args(["info", "--format", "json"])
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());

    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let tables = info["tables"].as_array().unwrap();
    assert!(tables.iter().any(|t| t["name"] == "order_items"));
}

#[test]
fn test_schema_command_reports_warnings() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("app.db");
    let schema = temp_dir.path().join("schema.sql");
    fs::write(
        &schema,
        "CREATE TABLE a (id INTEGER);\nCREATE TABLE a (id INTEGER);\nCREATE TABLE b (id INTEGER);\n",
    )
    .unwrap();

    pancake_cmd(&temp_dir).arg("create").arg(&db).assert().success();
    pancake_cmd(&temp_dir)
        .arg("schema")
        .arg(&db)
        .arg(&schema)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Error loading schema")
                .and(predicate::str::contains("Warning:"))
                .and(predicate::str::contains("Schema loaded from")),
        );
}

#[test]
fn test_templates_listed() {
    let temp_dir = TempDir::new().unwrap();
    pancake_cmd(&temp_dir)
        .arg("templates")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ecommerce")
                .and(predicate::str::contains("blog"))
                .and(predicate::str::contains("school")),
        );
}

#[test]
fn test_demo_writes_database_and_backup() {
    let temp_dir = TempDir::new().unwrap();

    pancake_cmd(&temp_dir)
        .args(["demo", "--dir"])
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("DEMONSTRATION COMPLETE"));

    assert!(temp_dir.path().join("demo_library.db").exists());
    assert!(temp_dir.path().join("library_backup.sql").exists());
}

#[test]
fn test_config_set_get_and_reset() {
    let temp_dir = TempDir::new().unwrap();

    pancake_cmd(&temp_dir)
        .args(["config", "get", "database.foreign_keys"])
        .assert()
        .success()
        .stdout("true\n");

    pancake_cmd(&temp_dir)
        .args(["config", "set", "database.foreign_keys", "false"])
        .assert()
        .success();
    assert!(temp_dir.path().join("config.toml").exists());

    pancake_cmd(&temp_dir)
        .args(["config", "get", "database.foreign_keys"])
        .assert()
        .success()
        .stdout("false\n");

    pancake_cmd(&temp_dir)
        .args(["config", "reset"])
        .assert()
        .success();
    assert!(!temp_dir.path().join("config.toml").exists());
}

#[test]
fn test_config_rejects_unknown_key() {
    let temp_dir = TempDir::new().unwrap();
    pancake_cmd(&temp_dir)
        .args(["config", "set", "database.page_size", "4096"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
}

#[test]
fn test_shell_reads_piped_menu_choices() {
    let temp_dir = TempDir::new().unwrap();
    pancake_cmd(&temp_dir)
        .arg("shell")
        .write_stdin("3\n9\n")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Not connected to any database")
                .and(predicate::str::contains("Goodbye!")),
        );
}

#[test]
fn test_config_oversized_busy_timeout_rejected() {
    let temp_dir = TempDir::new().unwrap();
    pancake_cmd(&temp_dir)
        .args(["config", "set", "database.busy_timeout_ms", "3000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("busy_timeout_ms"));
    assert!(!temp_dir.path().join("config.toml").exists());
}

#[test]
fn test_broken_config_can_still_be_located_and_reset() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("config.toml");
    fs::write(&config_file, "[database]\nforeign_keys = 3\n").unwrap();

    pancake_cmd(&temp_dir)
        .args(["tables", "whatever.db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config reset"));

    pancake_cmd(&temp_dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    fs::write(&config_file, "[logging]\nlevel = 'foo=bar=baz'\n").unwrap();
    pancake_cmd(&temp_dir)
        .args(["config", "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration reset to defaults."));
    assert!(!config_file.exists());
}

#[test]
fn test_create_with_template_json() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("blog.db");

    let output = pancake_cmd(&temp_dir)
        .args(["--format", "json", "create", "--template", "blog"])
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());

    let created: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(created["database"], db.display().to_string());
    assert!(created["schema"]["batch_error"].is_null());
    assert_eq!(created["schema"]["warnings"], serde_json::json!([]));
}
