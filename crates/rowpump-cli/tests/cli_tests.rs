//! CLI integration tests for rowpump.
//!
//! These verify flag parsing, help output, the examples text, exit codes,
//! and a full transfer through SQLite files.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a command for the rowpump binary.
fn cmd() -> Command {
    Command::cargo_bin("rowpump").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_flags() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--srcDB"))
        .stdout(predicate::str::contains("--tgtDB"))
        .stdout(predicate::str::contains("--srcTable"))
        .stdout(predicate::str::contains("--tgtTable"))
        .stdout(predicate::str::contains("--sqlFile"))
        .stdout(predicate::str::contains("--limit"))
        .stdout(predicate::str::contains("--drop"))
        .stdout(predicate::str::contains("--truncate"))
        .stdout(predicate::str::contains("--s3Bucket"))
        .stdout(predicate::str::contains("--examples"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rowpump"));
}

#[test]
fn test_examples_flag() {
    cmd()
        .arg("--examples")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("--srcDB $POSTGRES_URL"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_no_endpoints_fails() {
    cmd()
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("srcDB"));
}

#[test]
fn test_unsupported_scheme_fails() {
    cmd()
        .args(["--srcDB", "webscale://h/db", "--srcTable", "t"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported scheme"));
}

// =============================================================================
// Transfer Tests (SQLite, no server required)
// =============================================================================

#[test]
fn test_csv_to_sqlite_then_export_with_limit() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("file:{}/cli.db", dir.path().display());

    let csv = "name,age\nana,31\nbob,40\ncleo,25\n";
    cmd()
        .args(["--tgtDB", &url, "--tgtTable", "people", "--drop"])
        .write_stdin(csv)
        .assert()
        .success();

    let out = cmd()
        .args(["--srcDB", &url, "--srcTable", "people", "--limit", "2"])
        .write_stdin("")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3, "header plus two rows: {:?}", lines);
    assert_eq!(lines[0], "name,age");
}

#[test]
fn test_pipe_roundtrip_counts_match() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("file:{}/pipe.db", dir.path().display());

    let mut csv = String::from("n,s\n");
    for i in 0..50 {
        csv.push_str(&format!("{},row{}\n", i, i));
    }

    cmd()
        .args(["--tgtDB", &url, "--tgtTable", "t1", "--drop"])
        .write_stdin(csv.as_str())
        .assert()
        .success();

    let exported = cmd()
        .args(["--srcDB", &url, "--srcTable", "t1"])
        .write_stdin("")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let exported = String::from_utf8(exported).unwrap();
    assert_eq!(exported.lines().count(), 51);

    cmd()
        .args(["--tgtDB", &url, "--tgtTable", "t2", "--drop"])
        .write_stdin(exported.as_str())
        .assert()
        .success();

    let back = cmd()
        .args(["--srcDB", &url, "--srcTable", "t2"])
        .write_stdin("")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(String::from_utf8(back).unwrap().lines().count(), 51);
}
