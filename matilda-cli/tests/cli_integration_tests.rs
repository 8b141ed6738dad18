//! Integration tests for the matilda CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

use matilda_core::{create_demo_database, DemoKind};

fn matilda() -> Command {
    Command::cargo_bin("matilda").unwrap()
}

#[test]
fn test_cli_version() {
    matilda()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("matilda"));
}

#[test]
fn test_cli_help() {
    matilda()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--demo"))
        .stdout(predicate::str::contains("--database"));
}

#[test]
fn test_no_mode_is_config_error() {
    matilda()
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn test_unknown_demo_is_config_error() {
    matilda()
        .arg("--demo")
        .arg("strange_database")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("strange_database"));
}

#[test]
fn test_missing_database_is_driver_error() {
    let dir = tempfile::tempdir().unwrap();
    matilda()
        .current_dir(dir.path())
        .arg("--database")
        .arg("/nonexistent/never.db")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("driver"));
}

#[test]
fn test_demo_run_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    matilda()
        .current_dir(dir.path())
        .arg("--demo")
        .arg("imperfect_database")
        .assert()
        .success()
        .stdout(predicate::str::contains("Discovery complete"));
    assert!(dir
        .path()
        .join("results")
        .join("MATILDA_imperfect_database_results.json")
        .exists());
    assert!(dir
        .path()
        .join("results")
        .join("report_MATILDA_imperfect_database.md")
        .exists());
}

#[test]
fn test_config_run_discovers_expected_rule() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("imperfect_database.db");
    create_demo_database(DemoKind::Imperfect, &db_path).unwrap();

    let config_path = dir.path().join("matilda.yaml");
    let mut config = std::fs::File::create(&config_path).unwrap();
    writeln!(
        config,
        "database:\n  url: {}\nalgorithm:\n  nb_occurrence: 2\n  max_table: 2\n  max_vars: 4\n  confidence_threshold: 0.9\nresults:\n  output_dir: {}",
        db_path.display(),
        dir.path().join("out").display()
    )
    .unwrap();

    matilda()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Discovery complete"));

    let json = std::fs::read_to_string(
        dir.path()
            .join("out")
            .join("MATILDA_imperfect_database_results.json"),
    )
    .unwrap();
    assert!(json.contains("enrollment(_, x, _) → ∃y,z,w. student(x, y, z, w)"));
    assert!(json.contains("\"status\": \"success\""));
}

#[test]
fn test_invalid_config_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("broken.yaml");
    std::fs::write(&config_path, "algorithm:\n  max_tables: 3\n").unwrap();
    matilda()
        .arg("--config")
        .arg(&config_path)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_timeout_yields_partial_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("imperfect_database.db");
    create_demo_database(DemoKind::Imperfect, &db_path).unwrap();

    let config_path = dir.path().join("matilda.yaml");
    std::fs::write(
        &config_path,
        format!(
            "database:\n  url: {}\nmonitor:\n  timeout: 0.001\nresults:\n  output_dir: {}\n",
            db_path.display(),
            dir.path().join("out").display()
        ),
    )
    .unwrap();

    matilda()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config_path)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("cancelled"));

    let json = std::fs::read_to_string(
        dir.path()
            .join("out")
            .join("MATILDA_imperfect_database_results.json"),
    )
    .unwrap();
    assert!(json.contains("\"status\": \"partial\""));
}

#[test]
fn test_conflicting_modes_are_config_errors() {
    matilda()
        .arg("--demo")
        .arg("perfect_database")
        .arg("--database")
        .arg("/tmp/x.db")
        .assert()
        .code(3);
}
