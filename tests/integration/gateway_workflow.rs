//! Integration test: end-to-end gateway workflows.
//!
//! Registers a small tool set over an in-memory table store and a
//! temporary workspace directory, then drives calls through the gateway
//! the way an agent would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

use agentic_toolgate::audit::{JsonlAuditSink, MemoryAuditSink, TerminalState};
use agentic_toolgate::{
    verify_audit_chain, AllowlistPolicy, ConfirmationMode, FieldConstraint, FieldSpec, FnHandler,
    Gateway, HandlerError, InputSchema, InvocationRequest, Outcome, Scope, ToolDefinitionBuilder,
    ToolRegistry,
};

type Tables = Arc<Mutex<HashMap<String, u64>>>;

fn tables() -> Tables {
    let mut rows = HashMap::new();
    rows.insert("staging_imports".to_string(), 42);
    rows.insert("users".to_string(), 1_000);
    Arc::new(Mutex::new(rows))
}

/// Registers `truncate_table` over `tables`; returns the handler call count.
fn register_truncate(
    registry: &mut ToolRegistry,
    policy: &AllowlistPolicy,
    tables: &Tables,
) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let exec_tables = Arc::clone(tables);
    let preview_tables = Arc::clone(tables);
    let exec_calls = Arc::clone(&calls);

    let handler = FnHandler::new(
        move |args: &agentic_toolgate::ValidatedArgs| {
            exec_calls.fetch_add(1, Ordering::SeqCst);
            let table = args.str("table_name").unwrap_or_default();
            let mut rows = exec_tables.lock().unwrap();
            let deleted = rows
                .get_mut(table)
                .map(|n| std::mem::replace(n, 0))
                .ok_or_else(|| HandlerError::NotFound(format!("table {table}")))?;
            Ok(json!({"executed": true, "table": table, "rows_deleted": deleted}))
        },
        move |args: &agentic_toolgate::ValidatedArgs| {
            let table = args.str("table_name").unwrap_or_default();
            let count = preview_tables.lock().unwrap().get(table).copied().unwrap_or(0);
            Ok(json!({"executed": false, "table": table, "row_count": count}))
        },
    );

    registry
        .register(
            ToolDefinitionBuilder::new("truncate_table")
                .description("Delete every row of an allowlisted table")
                .scope(Scope::Write)
                .scope(Scope::Destructive)
                .schema(InputSchema::empty().field(FieldSpec::required(
                    "table_name",
                    policy.table_constraint(),
                )))
                .confirmation(ConfirmationMode::Flag)
                .target_field("table_name")
                .build(Arc::new(handler))
                .unwrap(),
        )
        .unwrap();
    calls
}

fn truncate(table: &str) -> InvocationRequest {
    InvocationRequest::new("agent-7", "truncate_table")
        .scope(Scope::Write)
        .scope(Scope::Destructive)
        .arg("table_name", table)
}

#[test]
fn truncate_table_scenario() {
    let policy = AllowlistPolicy::new()
        .table("staging_imports", ["id", "payload"])
        .canonicalize()
        .unwrap();
    let tables = tables();
    let mut registry = ToolRegistry::new();
    let calls = register_truncate(&mut registry, &policy, &tables);
    let sink = Arc::new(MemoryAuditSink::new());
    let gateway = Gateway::builder(registry).audit_sink(sink.clone()).build();

    // Not in the allowlist: rejected before the handler.
    let err = gateway.invoke(truncate("users").confirm(true)).unwrap_err();
    assert_eq!(err.kind(), "validation_error");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(tables.lock().unwrap()["users"], 1_000);

    // confirm=false: preview with the row count, nothing deleted.
    let preview = gateway
        .invoke(truncate("staging_imports").confirm(false))
        .unwrap();
    assert_eq!(preview.outcome, Outcome::Previewed);
    assert_eq!(preview.result["executed"], false);
    assert_eq!(preview.result["row_count"], 42);
    assert_eq!(tables.lock().unwrap()["staging_imports"], 42);

    // confirm=true: executes, deleting what the preview counted.
    let done = gateway
        .invoke(truncate("staging_imports").confirm(true))
        .unwrap();
    assert_eq!(done.outcome, Outcome::Executed);
    assert_eq!(done.result["executed"], true);
    assert_eq!(done.result["rows_deleted"], preview.result["row_count"]);

    // Again: the table is already empty.
    let again = gateway
        .invoke(truncate("staging_imports").confirm(true))
        .unwrap();
    assert_eq!(again.result["executed"], true);
    assert_eq!(again.result["rows_deleted"], 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let states: Vec<TerminalState> = sink.entries().iter().map(|e| e.terminal_state).collect();
    assert_eq!(
        states,
        vec![
            TerminalState::ValidationFailed,
            TerminalState::Previewed,
            TerminalState::Success,
            TerminalState::Success,
        ]
    );
}

#[test]
fn confirmation_omitted_never_mutates() {
    let policy = AllowlistPolicy::new()
        .table("staging_imports", ["id"])
        .canonicalize()
        .unwrap();
    let tables = tables();
    let mut registry = ToolRegistry::new();
    let calls = register_truncate(&mut registry, &policy, &tables);
    let gateway = Gateway::builder(registry).build();

    for _ in 0..5 {
        let resp = gateway.invoke(truncate("staging_imports")).unwrap();
        assert_eq!(resp.outcome, Outcome::Previewed);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(tables.lock().unwrap()["staging_imports"], 42);
}

#[test]
fn scope_denied_for_every_partial_grant() {
    let policy = AllowlistPolicy::new()
        .table("staging_imports", ["id"])
        .canonicalize()
        .unwrap();
    let tables = tables();
    let mut registry = ToolRegistry::new();
    let calls = register_truncate(&mut registry, &policy, &tables);
    let gateway = Gateway::builder(registry).build();

    let partial: [&[Scope]; 4] = [
        &[],
        &[Scope::Read],
        &[Scope::Write],
        &[Scope::Read, Scope::Destructive],
    ];
    for scopes in partial {
        let mut req = InvocationRequest::new("agent-7", "truncate_table")
            .arg("table_name", "staging_imports")
            .confirm(true);
        for scope in scopes {
            req = req.scope(*scope);
        }
        let err = gateway.invoke(req).unwrap_err();
        assert_eq!(err.kind(), "scope_denied", "granted {scopes:?}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn full_workflow_with_files_tokens_and_audit_file() {
    let workspace = tempfile::tempdir().unwrap();
    std::fs::write(workspace.path().join("notes.txt"), "hello").unwrap();
    let state = tempfile::tempdir().unwrap();
    let audit_path = state.path().join("audit.jsonl");

    let policy = AllowlistPolicy::new()
        .root(workspace.path())
        .table("staging_imports", ["id"])
        .canonicalize()
        .unwrap();

    let writes = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();

    // read_file: read scope, path confined to the workspace.
    registry
        .register(
            ToolDefinitionBuilder::new("read_file")
                .scope(Scope::Read)
                .schema(
                    InputSchema::empty()
                        .field(FieldSpec::required("path", policy.path_constraint())),
                )
                .build(Arc::new(agentic_toolgate::handler_fn(|args| {
                    let path = args.str("path").unwrap_or_default();
                    std::fs::read_to_string(path)
                        .map(|content| json!({"content": content}))
                        .map_err(|e| HandlerError::NotFound(e.to_string()))
                })))
                .unwrap(),
        )
        .unwrap();

    // append_note: idempotent write.
    let counter = Arc::clone(&writes);
    registry
        .register(
            ToolDefinitionBuilder::new("append_note")
                .scope(Scope::Write)
                .schema(
                    InputSchema::empty()
                        .field(FieldSpec::required("text", FieldConstraint::non_empty_string(200))),
                )
                .idempotent()
                .build(Arc::new(agentic_toolgate::handler_fn(move |args| {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(json!({"note_id": n, "text": args.str("text")}))
                })))
                .unwrap(),
        )
        .unwrap();

    // drop_table: token-gated.
    registry
        .register(
            ToolDefinitionBuilder::new("drop_table")
                .scope(Scope::Write)
                .scope(Scope::Destructive)
                .schema(
                    InputSchema::empty()
                        .field(FieldSpec::required("table_name", policy.table_constraint())),
                )
                .confirmation(ConfirmationMode::Token)
                .target_field("table_name")
                .build(Arc::new(agentic_toolgate::handler_fn(|args| {
                    Ok(json!({"dropped": args.str("table_name")}))
                })))
                .unwrap(),
        )
        .unwrap();

    let sink = Arc::new(JsonlAuditSink::open(&audit_path).unwrap());
    let gateway = Gateway::builder(registry).audit_sink(sink).build();

    let read = |path: &str| {
        InvocationRequest::new("agent-1", "read_file")
            .scope(Scope::Read)
            .arg("path", path)
    };
    assert_eq!(
        gateway.invoke(read("notes.txt")).unwrap().result["content"],
        "hello"
    );
    assert_eq!(
        gateway.invoke(read("sub/../notes.txt")).unwrap().result["content"],
        "hello"
    );
    assert_eq!(
        gateway.invoke(read("/etc/passwd")).unwrap_err().kind(),
        "validation_error"
    );
    assert_eq!(
        gateway.invoke(read("../../secret")).unwrap_err().kind(),
        "validation_error"
    );

    let note = || {
        InvocationRequest::new("agent-1", "append_note")
            .scope(Scope::Write)
            .arg("text", "remember the milk")
            .idempotency_key("note-1")
    };
    let first = gateway.invoke(note()).unwrap();
    let second = gateway.invoke(note()).unwrap();
    assert_eq!(
        serde_json::to_vec(&first.result).unwrap(),
        serde_json::to_vec(&second.result).unwrap()
    );
    assert_eq!(second.outcome, Outcome::Replayed);
    assert_eq!(writes.load(Ordering::SeqCst), 1);

    let drop_req = || {
        InvocationRequest::new("agent-1", "drop_table")
            .scope(Scope::Write)
            .scope(Scope::Destructive)
            .arg("table_name", "staging_imports")
    };
    assert_eq!(
        gateway.invoke(drop_req().confirm(true)).unwrap_err().kind(),
        "authorization_error"
    );
    let token = gateway.issue_token(drop_req()).unwrap();
    assert_eq!(
        gateway.invoke(drop_req().token(token.id.clone())).unwrap().outcome,
        Outcome::Executed
    );
    assert_eq!(
        gateway.invoke(drop_req().token(token.id.clone())).unwrap_err().kind(),
        "authorization_error"
    );

    let entries = JsonlAuditSink::read_all(&audit_path).unwrap();
    assert_eq!(entries.len(), 9);
    verify_audit_chain(&entries).unwrap();
    let text = std::fs::read_to_string(&audit_path).unwrap();
    assert!(!text.contains(&token.id));
    assert!(!text.contains("note-1"));
}

#[test]
fn audit_chain_resumes_across_restarts() {
    let state = tempfile::tempdir().unwrap();
    let audit_path = state.path().join("audit.jsonl");

    let build = || {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDefinitionBuilder::new("ping")
                    .scope(Scope::Read)
                    .build(Arc::new(agentic_toolgate::handler_fn(|_| Ok(json!("pong")))))
                    .unwrap(),
            )
            .unwrap();
        let sink = Arc::new(JsonlAuditSink::open(&audit_path).unwrap());
        let mut builder = Gateway::builder(registry).audit_sink(sink);
        if let Some((sequence, hash)) = JsonlAuditSink::head(&audit_path).unwrap() {
            builder = builder.audit_head(sequence, hash);
        }
        builder.build()
    };

    for _ in 0..3 {
        let gateway = build();
        gateway
            .invoke(InvocationRequest::new("agent", "ping").scope(Scope::Read))
            .unwrap();
        gateway
            .invoke(InvocationRequest::new("agent", "ping"))
            .unwrap_err();
    }

    let entries = JsonlAuditSink::read_all(&audit_path).unwrap();
    assert_eq!(entries.len(), 6);
    assert_eq!(entries.last().unwrap().sequence, 6);
    verify_audit_chain(&entries).unwrap();
}

#[test]
fn token_gated_tool_must_bind_a_required_target() {
    let purge = || {
        ToolDefinitionBuilder::new("purge_cache")
            .scope(Scope::Destructive)
            .confirmation(ConfirmationMode::Token)
    };
    let name = |required: bool| {
        let constraint = FieldConstraint::non_empty_string(64);
        InputSchema::empty().field(if required {
            FieldSpec::required("name", constraint)
        } else {
            FieldSpec::optional("name", constraint)
        })
    };
    let handler = || {
        Arc::new(agentic_toolgate::handler_fn(|args| {
            Ok(json!({"purged": args.str("name")}))
        }))
    };

    // Unbound, a token for "harmless" would authorize "prod-everything".
    let err = purge().schema(name(true)).build(handler()).unwrap_err();
    assert_eq!(err.kind(), "invalid_definition");
    let err = purge()
        .schema(name(false))
        .target_field("name")
        .build(handler())
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_definition");

    let mut registry = ToolRegistry::new();
    registry
        .register(
            purge()
                .schema(name(true))
                .target_field("name")
                .build(handler())
                .unwrap(),
        )
        .unwrap();
    let gateway = Gateway::builder(registry).build();
    let call = |target: &str| {
        InvocationRequest::new("agent-1", "purge_cache")
            .scope(Scope::Destructive)
            .arg("name", target)
    };

    let token = gateway.issue_token(call("harmless")).unwrap();
    let err = gateway
        .invoke(call("prod-everything").token(token.id.clone()))
        .unwrap_err();
    assert_eq!(err.kind(), "authorization_error");
    assert_eq!(
        gateway.invoke(call("harmless").token(token.id)).unwrap().result["purged"],
        "harmless"
    );
}
