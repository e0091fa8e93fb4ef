//! AgenticToolgate: a policy gateway between AI agents and the tools they call.
//!
//! Every tool invocation goes through one pipeline: registry lookup, scope
//! enforcement, closed-schema validation with allowlists and path
//! containment, idempotent replay, explicit confirmation for sensitive
//! operations, and a sanitized, hash-chained audit entry.

pub mod audit;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod fault;
pub mod gateway;
pub mod ids;
pub mod idempotency;
pub mod policy;
pub mod registry;
pub mod schema;
pub mod scope;
pub mod storage;
pub mod time;

// Re-export primary types
pub use error::{GateError, Result};
pub use gateway::{Gateway, GatewayBuilder, InvocationRequest, InvocationResponse, Outcome};
pub use registry::{
    handler_fn, FnHandler, HandlerError, HandlerResult, ToolDefinition, ToolDefinitionBuilder,
    ToolHandler, ToolRegistry,
};
pub use scope::{authorize, Scope, ScopeSet};

// Re-export validation types
pub use policy::AllowlistPolicy;
pub use schema::{FieldConstraint, FieldSpec, InputSchema, ValidatedArgs};

// Re-export confirmation and idempotency types
pub use confirmation::{
    ApprovalRequest, ApprovalState, ConfirmationLedger, ConfirmationMode, ConfirmationParams,
    ConfirmationToken,
};
pub use idempotency::{IdempotencyRecord, IdempotencyStore, MemoryIdempotencyStore};

// Re-export audit types
pub use audit::{
    verify_audit_chain, AuditEntry, AuditResult, AuditSink, JsonlAuditSink, MemoryAuditSink,
    TerminalState,
};
pub use config::{GatewayConfig, ToolgateConfig};
pub use fault::{FaultReporter, LogFaultReporter, MemoryFaultReporter, OperationalFault};
