//! Integration tests for the CLI binary.
//!
//! This test is registered as a [[test]] in the agentic-toolgate-cli crate
//! so that CARGO_BIN_EXE_tgate is available.

use std::path::Path;
use std::process::{Command, Output};

use agentic_toolgate::ConfirmationLedger;

/// Get a Command pointing to the `tgate` binary.
fn tgate_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tgate"))
}

fn tgate(dir: &Path, args: &[&str]) -> Output {
    tgate_binary()
        .arg("--dir")
        .arg(dir)
        .args(args)
        .output()
        .expect("failed to execute tgate")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn cli_responds_to_help() {
    let output = tgate_binary()
        .arg("--help")
        .output()
        .expect("failed to execute tgate --help");

    assert!(
        output.status.success(),
        "tgate --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let out = stdout(&output);
    assert!(
        out.contains("tgate") || out.contains("AgenticToolgate") || out.contains("Usage"),
        "tgate --help output should contain usage information, got: {out}"
    );
}

#[test]
fn cli_responds_to_version() {
    let output = tgate_binary()
        .arg("--version")
        .output()
        .expect("failed to execute tgate --version");

    assert!(output.status.success());
    assert!(stdout(&output).contains("0.1"));
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = tgate_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute tgate");

    assert!(
        !output.status.success(),
        "tgate with unknown flag should exit with error"
    );
}

#[test]
fn cli_token_issue_and_list() {
    let dir = tempfile::tempdir().unwrap();
    let issued = tgate(
        dir.path(),
        &[
            "token",
            "issue",
            "--operation",
            "truncate_table",
            "--target",
            "staging_imports",
            "--ttl",
            "15m",
        ],
    );
    assert!(issued.status.success());
    let out = stdout(&issued);
    assert!(out.contains("atok_"));
    assert!(dir.path().join("confirmations.json").exists());

    let listed = tgate(dir.path(), &["token", "list"]);
    assert!(listed.status.success());
    let out = stdout(&listed);
    assert!(out.contains("truncate_table"));
    assert!(out.contains("active"));
}

#[test]
fn cli_rejects_bad_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let output = tgate(
        dir.path(),
        &["token", "issue", "--operation", "x", "--target", "y", "--ttl", "10x"],
    );
    assert!(!output.status.success());
}

#[test]
fn cli_approval_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let requested = tgate(
        dir.path(),
        &["approval", "request", "--operation", "delete_bucket", "--target", "logs"],
    );
    assert!(requested.status.success());
    let out = stdout(&requested);
    let id = out
        .lines()
        .find_map(|line| line.trim().strip_prefix("ID:"))
        .map(|id| id.trim().to_string())
        .expect("approval id in output");

    let approved = tgate(dir.path(), &["approval", "approve", &id, "--by", "oncall"]);
    assert!(approved.status.success());

    let again = tgate(dir.path(), &["approval", "reject", &id]);
    assert!(!again.status.success(), "decided request cannot be rejected");

    let listed = tgate(dir.path(), &["approval", "list", "--state", "approved"]);
    assert!(stdout(&listed).contains(&id));
}

fn issued_token_id(output: &Output) -> String {
    stdout(output)
        .lines()
        .find_map(|line| line.trim().strip_prefix("Token:"))
        .map(|id| id.trim().to_string())
        .expect("token id in output")
}

#[test]
fn cli_keeps_consumption_made_by_a_running_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let issue = |target: &str| {
        tgate(
            dir.path(),
            &["token", "issue", "--operation", "purge_cache", "--target", target],
        )
    };

    let first = issue("edge-eu");
    assert!(first.status.success());
    let token = issued_token_id(&first);

    // A gateway holding the ledger open consumes the token.
    let gateway_side = ConfirmationLedger::open(dir.path().join("confirmations.json")).unwrap();
    gateway_side
        .consume_token(&token, "purge_cache", "edge-eu")
        .unwrap();

    // Later operator writes must not resurrect it.
    assert!(issue("edge-us").status.success());
    assert!(tgate(dir.path(), &["token", "sweep"]).status.success());

    let reopened = ConfirmationLedger::open(dir.path().join("confirmations.json")).unwrap();
    assert!(reopened.token(&token).unwrap().unwrap().consumed);
    assert!(reopened
        .consume_token(&token, "purge_cache", "edge-eu")
        .is_err());
    assert_eq!(reopened.snapshot().unwrap().tokens.len(), 2);
    assert!(stdout(&tgate(dir.path(), &["token", "list"])).contains("consumed"));
}

#[test]
fn cli_approval_reaches_a_running_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let gateway_side = ConfirmationLedger::open(dir.path().join("confirmations.json")).unwrap();
    let request = gateway_side.create_approval("delete_bucket", "old-logs").unwrap();

    let approved = tgate(dir.path(), &["approval", "approve", &request.id, "--by", "oncall"]);
    assert!(approved.status.success());

    let consumed = gateway_side
        .consume_approval(&request.id, "delete_bucket", "old-logs")
        .unwrap();
    assert_eq!(consumed.decided_by.as_deref(), Some("oncall"));
}

#[test]
fn cli_path_check() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_str().unwrap();

    let inside = tgate(dir.path(), &["path", "check", "--root", root, "sub/../file.txt"]);
    assert!(inside.status.success());
    assert!(stdout(&inside).contains("allowed"));

    let outside = tgate(dir.path(), &["path", "check", "--root", root, "../../secret"]);
    assert!(!outside.status.success());
}

#[test]
fn cli_audit_verify_empty_log() {
    let dir = tempfile::tempdir().unwrap();
    let output = tgate(dir.path(), &["audit", "verify"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("valid"));
}

#[test]
fn cli_policy_check_reports_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    let output = tgate(dir.path(), &["policy", "check"]);
    assert!(!output.status.success());

    std::fs::write(
        dir.path().join("config.json"),
        r#"{"version": 1, "policy": {"tables": {"staging_imports": ["id"]}}}"#,
    )
    .unwrap();
    let output = tgate(dir.path(), &["policy", "check"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("staging_imports"));
}
