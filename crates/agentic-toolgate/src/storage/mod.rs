//! Storage layer for the confirmation ledger and the audit log.
//!
//! # Directory layout
//!
//! By convention the default root is `~/.agentic/toolgate/`:
//!
//! ```text
//! ~/.agentic/toolgate/
//! ├── config.json          gateway tunables and allowlist policy
//! ├── confirmations.json   tokens and approval requests
//! └── audit.jsonl          hash-chained audit entries
//! ```
//!
//! The audit log itself is written by `audit::JsonlAuditSink`.

pub mod ledger_file;

pub use ledger_file::LedgerFile;

pub const CONFIG_FILE: &str = "config.json";
pub const LEDGER_FILE: &str = "confirmations.json";
pub const AUDIT_FILE: &str = "audit.jsonl";
