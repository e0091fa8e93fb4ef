//! Integration test: the confirmation ledger shared through its file.
//!
//! The operator CLI and the gateway process share the ledger through one
//! file, so state written by one must be honoured by the other, and no
//! writer may overwrite what another has recorded.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use serde_json::json;

use agentic_toolgate::{
    handler_fn, ApprovalState, ConfirmationLedger, ConfirmationMode, FieldConstraint, FieldSpec,
    Gateway, InputSchema, InvocationRequest, Outcome, Scope, ToolDefinitionBuilder, ToolRegistry,
};

const TTL: Duration = Duration::from_secs(600);

fn gateway_with(ledger: Arc<ConfirmationLedger>, calls: Arc<AtomicUsize>) -> Gateway {
    let mut registry = ToolRegistry::new();
    for (name, mode) in [
        ("purge_cache", ConfirmationMode::Token),
        ("delete_bucket", ConfirmationMode::Approval),
    ] {
        let calls = Arc::clone(&calls);
        registry
            .register(
                ToolDefinitionBuilder::new(name)
                    .scope(Scope::Destructive)
                    .schema(InputSchema::empty().field(FieldSpec::required(
                        "name",
                        FieldConstraint::non_empty_string(64),
                    )))
                    .confirmation(mode)
                    .target_field("name")
                    .build(Arc::new(handler_fn(move |args| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(json!({"removed": args.str("name")}))
                    })))
                    .unwrap(),
            )
            .unwrap();
    }
    Gateway::builder(registry).ledger(ledger).build()
}

fn open(path: &std::path::Path) -> Arc<ConfirmationLedger> {
    Arc::new(ConfirmationLedger::open(path).unwrap())
}

fn call(tool: &str, name: &str) -> InvocationRequest {
    InvocationRequest::new("agent-3", tool)
        .scope(Scope::Destructive)
        .arg("name", name)
}

#[test]
fn token_issued_out_of_process_is_honoured_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("confirmations.json");
    let calls = Arc::new(AtomicUsize::new(0));

    // Gateway is already running when the operator issues.
    let gateway = gateway_with(open(&path), Arc::clone(&calls));
    let token = open(&path).issue("purge_cache", "edge-eu", TTL).unwrap();

    let done = gateway
        .invoke(call("purge_cache", "edge-eu").token(token.id.clone()))
        .unwrap();
    assert_eq!(done.outcome, Outcome::Executed);

    // Consumption is on disk without any explicit save.
    let stored = open(&path).token(&token.id).unwrap().unwrap();
    assert!(stored.consumed);
    assert!(stored.consumed_at.is_some());

    let restarted = gateway_with(open(&path), Arc::clone(&calls));
    let err = restarted
        .invoke(call("purge_cache", "edge-eu").token(token.id))
        .unwrap_err();
    assert_eq!(err.kind(), "authorization_error");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn stale_operator_write_cannot_revive_consumed_token() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("confirmations.json");
    let calls = Arc::new(AtomicUsize::new(0));

    // Operator opens the ledger and issues T.
    let operator = open(&path);
    let token = operator.issue("purge_cache", "edge-eu", TTL).unwrap();

    // Gateway consumes T.
    let gateway = gateway_with(open(&path), Arc::clone(&calls));
    gateway
        .invoke(call("purge_cache", "edge-eu").token(token.id.clone()))
        .unwrap();

    // The operator's handle was opened before the consume; it issues an
    // unrelated token.
    operator.issue("purge_cache", "edge-us", TTL).unwrap();
    assert_eq!(operator.snapshot().unwrap().tokens.len(), 2);

    // After a restart T is still spent.
    drop(gateway);
    let restarted = gateway_with(open(&path), Arc::clone(&calls));
    let err = restarted
        .invoke(call("purge_cache", "edge-eu").token(token.id.clone()))
        .unwrap_err();
    assert_eq!(err.kind(), "authorization_error");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(open(&path).token(&token.id).unwrap().unwrap().consumed);
}

#[test]
fn approval_decided_while_gateway_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("confirmations.json");
    let calls = Arc::new(AtomicUsize::new(0));

    let ledger = open(&path);
    let gateway = gateway_with(Arc::clone(&ledger), Arc::clone(&calls));
    let request = gateway
        .request_approval(call("delete_bucket", "old-logs"))
        .unwrap();
    assert_eq!(request.state, ApprovalState::Pending);

    // Operator approves through their own handle; the gateway is not
    // restarted.
    open(&path).approve(&request.id, Some("oncall")).unwrap();
    let approved = ledger.approval(&request.id).unwrap().unwrap();
    assert_eq!(approved.state, ApprovalState::Approved);
    assert_eq!(approved.decided_by.as_deref(), Some("oncall"));

    let done = gateway
        .invoke(call("delete_bucket", "old-logs").approval(request.id.clone()))
        .unwrap();
    assert_eq!(done.result["removed"], "old-logs");
    assert_eq!(
        open(&path).approval(&request.id).unwrap().unwrap().state,
        ApprovalState::Consumed
    );
}

#[test]
fn rejected_approval_never_executes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("confirmations.json");
    let operator = open(&path);
    let request = operator.create_approval("delete_bucket", "prod-data").unwrap();
    operator
        .reject(&request.id, Some("security"), Some("production data"))
        .unwrap();

    let gateway = gateway_with(open(&path), Arc::new(AtomicUsize::new(0)));
    let err = gateway
        .invoke(call("delete_bucket", "prod-data").approval(request.id.clone()))
        .unwrap_err();
    assert_eq!(err.kind(), "authorization_error");

    // A decided request cannot be decided again, from any handle.
    assert_eq!(
        open(&path).approve(&request.id, None).unwrap_err().kind(),
        "conflict"
    );
}

#[test]
fn gateways_sharing_a_file_consume_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("confirmations.json");
    let calls = Arc::new(AtomicUsize::new(0));
    let token = open(&path).issue("purge_cache", "edge-eu", TTL).unwrap();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            // One handle per thread, as separate processes would have.
            let gateway = gateway_with(open(&path), Arc::clone(&calls));
            let barrier = Arc::clone(&barrier);
            let request = call("purge_cache", "edge-eu").token(token.id.clone());
            thread::spawn(move || {
                barrier.wait();
                gateway.invoke(request).is_ok()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn contents_are_lossless_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("confirmations.json");
    let writer = open(&path);
    for i in 0..10 {
        writer
            .issue("purge_cache", &format!("edge-{i}"), Duration::from_secs(60))
            .unwrap();
        writer
            .create_approval("delete_bucket", &format!("bucket-{i}"))
            .unwrap();
    }

    let before = writer.snapshot().unwrap();
    let after = open(&path).snapshot().unwrap();
    assert_eq!(before, after);
    assert_eq!(after.tokens.len(), 10);
    assert_eq!(after.approvals.len(), 10);

    // An in-memory copy of the same contents behaves the same.
    let copy = ConfirmationLedger::from_snapshot(after.clone());
    assert_eq!(copy.snapshot().unwrap(), after);
}
