//! Audit trail: exactly one sanitized, hash-chained entry per invocation.

pub mod chain;
pub mod entry;
pub mod file_sink;
pub mod logger;
pub mod sanitize;
pub mod sink;

pub use chain::{compute_entry_hash, verify_audit_chain};
pub use entry::{AuditEntry, AuditResult, TerminalState};
pub use file_sink::JsonlAuditSink;
pub use logger::AuditLogger;
pub use sanitize::{redact, Sanitizer, SECRET_PATTERNS};
pub use sink::{AuditSink, MemoryAuditSink};
