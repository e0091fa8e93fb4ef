//! Error types for AgenticToolgate.
//!
//! All errors are strongly typed and propagated without panicking.
//! Raw confirmation tokens and secret argument values are never included
//! in error messages.

use crate::scope::Scope;

/// Gateway error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool definition: {0}")]
    InvalidDefinition(String),

    #[error("Scope denied for {tool}: missing {}", format_scopes(.missing))]
    ScopeDenied { tool: String, missing: Vec<Scope> },

    #[error("Invalid argument '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("Confirmation rejected: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Handler failed ({kind}): {message}")]
    Handler { kind: String, message: String },

    #[error("Another call with the same idempotency key is still running for {tool}")]
    InFlight { tool: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Audit chain broken at entry {0}")]
    AuditChainBroken(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Stable, machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateTool(_) => "duplicate_tool",
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidDefinition(_) => "invalid_definition",
            Self::ScopeDenied { .. } => "scope_denied",
            Self::Validation { .. } => "validation_error",
            Self::Authorization(_) => "authorization_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Handler { .. } => "handler_error",
            Self::InFlight { .. } => "in_flight",
            Self::InvalidConfig(_) => "invalid_config",
            Self::StorageError(_) => "storage_error",
            Self::SerializationError(_) => "serialization_error",
            Self::InvalidFileFormat(_) => "invalid_file_format",
            Self::AuditChainBroken(_) => "audit_chain_broken",
            Self::Io(_) => "io_error",
        }
    }

    /// Shorthand for a validation failure on `field`.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for faults of the gateway's own stores and sinks, as opposed to
    /// caller or handler outcomes.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            Self::StorageError(_)
                | Self::SerializationError(_)
                | Self::InvalidFileFormat(_)
                | Self::Io(_)
        )
    }
}

fn format_scopes(scopes: &[Scope]) -> String {
    scopes
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, GateError>;
