//! CLI Argument Parsing Compatibility Tests
//!
//! These tests verify that command-line arguments are parsed correctly and keep
//! accepting the names, aliases and value formats existing scripts rely on.

use assert_cmd::Command;

fn storprobe() -> Command {
    Command::cargo_bin("storprobe").unwrap()
}

#[test]
fn test_help_runs() {
    storprobe().arg("--help").assert().success();
}

#[test]
fn test_version_runs() {
    storprobe().arg("--version").assert().success();
}

#[test]
fn test_subcommand_help() {
    for subcommand in ["analyze", "list", "verify-access"] {
        storprobe()
            .args([subcommand, "--help"])
            .assert()
            .success()
            .stdout(predicates::str::contains("SSH options"))
            .stdout(predicates::str::contains("Object store options"));
    }
}

#[test]
fn test_missing_subcommand_is_rejected() {
    storprobe().assert().failure();
}

#[test]
fn test_missing_location_is_rejected() {
    storprobe()
        .arg("analyze")
        .assert()
        .failure()
        .stderr(predicates::str::contains("<LOCATION>"));
}

// ============================================================================
// Storage type parsing
// ============================================================================

#[test]
fn test_storage_type_values() {
    for storage_type in ["local", "nfs", "nfs4", "ssh", "s3", "NFS4"] {
        storprobe()
            .args(["analyze", "/data", "--storage-type", storage_type, "--help"])
            .assert()
            .success();
    }
}

#[test]
fn test_storage_type_invalid_value() {
    storprobe()
        .args(["analyze", "/data", "--storage-type", "gcs"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value 'gcs'"));
}

// ============================================================================
// Backend flags
// ============================================================================

#[test]
fn test_ssh_flags() {
    storprobe()
        .args([
            "list",
            "/data",
            "--hostname",
            "server.com",
            "--username",
            "alice",
            "--ssh-key",
            "/keys/id_ed25519",
            "--help",
        ])
        .assert()
        .success();
}

#[test]
fn test_fs_username_alias() {
    storprobe()
        .args(["verify-access", "/data", "--fs-username", "alice", "--help"])
        .assert()
        .success();
}

#[test]
fn test_object_store_flags() {
    storprobe()
        .args([
            "analyze",
            "s3://bucket/data",
            "--access-key-id",
            "AKID",
            "--secret-access-key",
            "SECRET",
            "--session-token",
            "TOKEN",
            "--region",
            "eu-west-1",
            "--endpoint-url",
            "http://localhost:9000",
            "--aws-profile",
            "analytics",
            "--help",
        ])
        .assert()
        .success();
}

#[test]
fn test_region_default_shown_in_help() {
    storprobe()
        .args(["analyze", "--help"])
        .assert()
        .success()
        .stdout(predicates::str::contains("us-east-1"));
}

#[test]
fn test_timeout_default_shown_in_help() {
    storprobe()
        .args(["list", "--help"])
        .assert()
        .success()
        .stdout(predicates::str::contains("[default: 300]"));
}

#[test]
fn test_timeout_must_be_numeric() {
    storprobe()
        .args(["analyze", "/data", "--timeout", "soon"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value 'soon'"));
}

#[test]
fn test_max_items_must_be_numeric() {
    storprobe()
        .args(["list", "/data", "--max-items", "-3"])
        .assert()
        .failure();
}

// ============================================================================
// Global flags
// ============================================================================

#[test]
fn test_verbose_counts_and_global_position() {
    storprobe()
        .args(["-vvv", "analyze", "/data", "--help"])
        .assert()
        .success();
    storprobe()
        .args(["analyze", "/data", "-q", "--max-workers", "2", "--help"])
        .assert()
        .success();
}
