//! End-to-end tests driving the compiled gpnstore binary through a full
//! create -> ingest -> inspect workflow.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::TempDir;

#[allow(deprecated)]
fn gpnstore() -> Command {
    Command::cargo_bin("gpnstore").expect("failed to find gpnstore binary")
}

#[test]
fn new_creates_a_node_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("census.gpn");

    gpnstore()
        .args(["new", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created node"));

    assert!(path.exists());
}

#[test]
fn new_cancels_when_file_already_exists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("census.gpn");

    gpnstore().args(["new", path.to_str().unwrap()]).assert().success();

    gpnstore()
        .args(["new", path.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn new_refuses_missing_parent_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing-parent").join("census.gpn");

    gpnstore()
        .args(["new", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn ingest_then_inspect_round_trips_a_csv_file() {
    let dir = TempDir::new().unwrap();
    let node_path = dir.path().join("census.gpn");
    let csv_path = dir.path().join("counties.csv");

    let mut csv_file = std::fs::File::create(&csv_path).unwrap();
    writeln!(csv_file, "state,county").unwrap();
    writeln!(csv_file, "OH,Franklin").unwrap();
    drop(csv_file);

    gpnstore()
        .args(["new", node_path.to_str().unwrap()])
        .assert()
        .success();

    gpnstore()
        .args(["ingest", node_path.to_str().unwrap(), csv_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Inserted 1 row"));

    gpnstore()
        .args(["inspect", node_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("unique id"))
        .stdout(predicate::str::contains("hierarchy levels: state, county"))
        .stdout(predicate::str::contains("cell count"));
}

#[test]
fn inspect_reports_missing_node_as_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("does-not-exist.gpn");

    gpnstore()
        .args(["inspect", path.to_str().unwrap()])
        .assert()
        .failure();
}
