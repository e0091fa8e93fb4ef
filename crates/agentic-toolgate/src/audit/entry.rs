//! Audit entries: one per invocation attempt.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse result kind of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Error,
    ScopeDenied,
    ValidationError,
    ConfirmationFailed,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::ScopeDenied => "scope_denied",
            Self::ValidationError => "validation_error",
            Self::ConfirmationFailed => "confirmation_failed",
        }
    }
}

/// Terminal state an invocation ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    /// Handler ran and succeeded.
    Success,
    /// Stored result replayed for a repeated idempotency key.
    IdempotentHit,
    /// Confirmation-gated call without confirmation; preview returned.
    Previewed,
    UnknownTool,
    ScopeDenied,
    ValidationFailed,
    ConfirmationFailed,
    HandlerError,
    /// Same key still executing elsewhere after the wait.
    InFlight,
    /// Key already used with different arguments; nothing was executed.
    KeyConflict,
    /// The idempotency store failed; nothing was executed.
    StoreFault,
}

impl TerminalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::IdempotentHit => "idempotent_hit",
            Self::Previewed => "previewed",
            Self::UnknownTool => "unknown_tool",
            Self::ScopeDenied => "scope_denied",
            Self::ValidationFailed => "validation_failed",
            Self::ConfirmationFailed => "confirmation_failed",
            Self::HandlerError => "handler_error",
            Self::InFlight => "in_flight",
            Self::KeyConflict => "key_conflict",
            Self::StoreFault => "store_fault",
        }
    }

    /// Result kind recorded for this terminal state.
    pub fn result(&self) -> AuditResult {
        match self {
            Self::Success | Self::IdempotentHit | Self::Previewed => AuditResult::Success,
            Self::ScopeDenied => AuditResult::ScopeDenied,
            Self::ValidationFailed => AuditResult::ValidationError,
            Self::ConfirmationFailed => AuditResult::ConfirmationFailed,
            Self::UnknownTool
            | Self::HandlerError
            | Self::InFlight
            | Self::KeyConflict
            | Self::StoreFault => AuditResult::Error,
        }
    }
}

/// One audit record. Append-only: never mutated after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the log, assigned by the logger (starts at 1).
    pub sequence: u64,
    /// Microseconds since epoch.
    pub timestamp: u64,
    pub tool_name: String,
    pub caller_id: String,
    /// Scopes the caller presented.
    pub scopes: Vec<String>,
    /// Arguments after redaction and truncation.
    pub sanitized_arguments: Value,
    pub result: AuditResult,
    pub terminal_state: TerminalState,
    /// Stable error kind (`GateError::kind`).
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub duration_micros: u64,
    /// Short SHA-256 of the idempotency key, never the key itself.
    pub idempotency_key_hash: Option<String>,
    /// Confirmation material presented: none, flag, token, approval.
    pub confirmation: String,
    /// Hash of the preceding entry; `None` for the first.
    pub previous_hash: Option<String>,
    /// SHA-256 over this entry with `entry_hash` empty.
    pub entry_hash: String,
}

impl AuditEntry {
    /// Start an entry; the logger fills in sequence and hashes.
    pub fn new(
        tool_name: impl Into<String>,
        caller_id: impl Into<String>,
        terminal_state: TerminalState,
    ) -> Self {
        Self {
            sequence: 0,
            timestamp: crate::time::now_micros(),
            tool_name: tool_name.into(),
            caller_id: caller_id.into(),
            scopes: Vec::new(),
            sanitized_arguments: Value::Object(Default::default()),
            result: terminal_state.result(),
            terminal_state,
            error_type: None,
            error_message: None,
            duration_micros: 0,
            idempotency_key_hash: None,
            confirmation: "none".to_string(),
            previous_hash: None,
            entry_hash: String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.result != AuditResult::Success
    }
}
