//! Audit completeness: one entry per call, nothing secret in any entry.
//!
//! Drives every reachable terminal state, single-threaded and under load,
//! and checks the trail against the calls that were made.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serde_json::json;

use agentic_toolgate::audit::{AuditEntry, AuditSink, MemoryAuditSink, TerminalState};
use agentic_toolgate::{
    handler_fn, verify_audit_chain, ConfirmationMode, FieldConstraint, FieldSpec, Gateway,
    GateError, HandlerError, InputSchema, InvocationRequest, MemoryFaultReporter, Result, Scope,
    ToolDefinitionBuilder, ToolRegistry,
};

const PASSWORD: &str = "correct-horse-battery-staple";

fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(
            ToolDefinitionBuilder::new("login_service")
                .scope(Scope::Write)
                .schema(
                    InputSchema::empty()
                        .field(FieldSpec::required("user", FieldConstraint::non_empty_string(32)))
                        .field(FieldSpec::required("password", FieldConstraint::string(128)))
                        .field(FieldSpec::optional(
                            "options",
                            FieldConstraint::string(4_096),
                        )),
                )
                .idempotent()
                .build(Arc::new(handler_fn(|args| {
                    if args.str("user") == Some("locked") {
                        return Err(HandlerError::Conflict("account locked".into()));
                    }
                    Ok(json!({"session": "s-1"}))
                })))
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            ToolDefinitionBuilder::new("wipe_cache")
                .scope(Scope::Destructive)
                .schema(InputSchema::empty().field(FieldSpec::required(
                    "namespace",
                    FieldConstraint::non_empty_string(64),
                )))
                .confirmation(ConfirmationMode::Token)
                .target_field("namespace")
                .build(Arc::new(handler_fn(|_| Ok(json!({"wiped": true})))))
                .unwrap(),
        )
        .unwrap();
    registry
}

fn login(user: &str) -> InvocationRequest {
    InvocationRequest::new("agent-9", "login_service")
        .scope(Scope::Write)
        .arg("user", user)
        .arg("password", PASSWORD)
}

fn wipe(namespace: &str) -> InvocationRequest {
    InvocationRequest::new("agent-9", "wipe_cache")
        .scope(Scope::Destructive)
        .arg("namespace", namespace)
}

fn assert_clean(entries: &[AuditEntry], secrets: &[&str]) {
    let text = serde_json::to_string(entries).unwrap();
    for secret in secrets {
        assert!(!text.contains(secret), "audit trail leaked {secret}");
    }
}

#[test]
fn every_terminal_state_audited_once() {
    let sink = Arc::new(MemoryAuditSink::new());
    let gateway = Gateway::builder(registry()).audit_sink(sink.clone()).build();
    let token = gateway.issue_token(wipe("sessions")).unwrap();

    let cases: Vec<(InvocationRequest, TerminalState)> = vec![
        (login("ana"), TerminalState::Success),
        (login("ana").idempotency_key("login-1"), TerminalState::Success),
        (login("ana").idempotency_key("login-1"), TerminalState::IdempotentHit),
        (
            InvocationRequest::new("agent-9", "login_service").arg("password", PASSWORD),
            TerminalState::ScopeDenied,
        ),
        (login("ana").arg("otp", "123456"), TerminalState::ValidationFailed),
        (login("locked"), TerminalState::HandlerError),
        (wipe("sessions"), TerminalState::Previewed),
        (wipe("sessions").token("atok_forged"), TerminalState::ConfirmationFailed),
        (wipe("sessions").token(token.id.clone()), TerminalState::Success),
        (
            InvocationRequest::new("agent-9", "reboot_host").arg("password", PASSWORD),
            TerminalState::UnknownTool,
        ),
        (login("bea").idempotency_key("login-1"), TerminalState::KeyConflict),
    ];

    for (i, (request, expected)) in cases.into_iter().enumerate() {
        let _ = gateway.invoke(request);
        let entries = sink.entries();
        assert_eq!(entries.len(), i + 1, "case {i} must add exactly one entry");
        assert_eq!(entries[i].terminal_state, expected, "case {i}");
    }

    let entries = sink.entries();
    verify_audit_chain(&entries).unwrap();
    assert_clean(&entries, &[PASSWORD, &token.id, "atok_forged", "login-1"]);

    let failed = entries.iter().filter(|e| e.is_error()).count();
    assert_eq!(failed, 6);
    assert_eq!(entries[5].error_type.as_deref(), Some("conflict"));
    assert_eq!(entries[8].confirmation, "token");
    assert_eq!(entries[10].error_type.as_deref(), Some("conflict"));
}

#[test]
fn oversized_arguments_are_bounded() {
    let sink = Arc::new(MemoryAuditSink::new());
    let gateway = Gateway::builder(registry()).audit_sink(sink.clone()).build();
    let blob = "z".repeat(4_000);
    gateway.invoke(login("ana").arg("options", blob.as_str())).unwrap();

    let entries = sink.entries();
    assert_eq!(entries[0].sanitized_arguments["options"]["truncated"], true);
    assert!(!serde_json::to_string(&entries).unwrap().contains(&blob));
}

#[test]
fn stress_audit_count_matches_calls() {
    let sink = Arc::new(MemoryAuditSink::new());
    let gateway = Arc::new(Gateway::builder(registry()).audit_sink(sink.clone()).build());

    let handles: Vec<_> = (0..16)
        .map(|t| {
            let gateway = Arc::clone(&gateway);
            thread::spawn(move || {
                for i in 0..100 {
                    let request = match i % 4 {
                        0 => login("ana"),
                        1 => login("locked"),
                        2 => login("ana").idempotency_key(format!("t{t}-{i}")),
                        _ => InvocationRequest::new("agent-9", "login_service"),
                    };
                    let _ = gateway.invoke(request);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let entries = sink.entries();
    assert_eq!(entries.len(), 1_600);
    verify_audit_chain(&entries).unwrap();
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.sequence, i as u64 + 1);
    }
    assert_clean(&entries, &[PASSWORD]);
}

struct BrokenSink {
    broken: AtomicBool,
    inner: MemoryAuditSink,
}

impl AuditSink for BrokenSink {
    fn append(&self, entry: &AuditEntry) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(GateError::StorageError("audit volume unavailable".into()));
        }
        self.inner.append(entry)
    }
}

#[test]
fn sink_failure_does_not_fail_the_call() {
    let sink = Arc::new(BrokenSink {
        broken: AtomicBool::new(true),
        inner: MemoryAuditSink::new(),
    });
    let faults = Arc::new(MemoryFaultReporter::new());
    let gateway = Gateway::builder(registry())
        .audit_sink(sink.clone())
        .fault_reporter(faults.clone())
        .build();

    let resp = gateway.invoke(login("ana")).unwrap();
    assert_eq!(resp.result["session"], "s-1");
    assert_eq!(gateway.audit_failures(), 1);

    let reported = faults.faults();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].component, "audit_sink");

    sink.broken.store(false, Ordering::SeqCst);
    gateway.invoke(login("ana")).unwrap();
    let entries = sink.inner.entries();
    assert_eq!(entries.len(), 1);
    verify_audit_chain(&entries).unwrap();
}
