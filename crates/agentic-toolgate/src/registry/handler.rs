//! Tool handler contract.
//!
//! A handler turns validated arguments into a structured JSON result. It
//! never checks scopes or confirmation; the gateway does that before the
//! handler is reached.

use serde_json::Value;

use crate::error::GateError;
use crate::schema::ValidatedArgs;

/// Domain outcome reported by a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("{kind}: {message}")]
    Failed { kind: String, message: String },
}

impl HandlerError {
    pub fn failed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<HandlerError> for GateError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::NotFound(msg) => GateError::NotFound(msg),
            HandlerError::Conflict(msg) => GateError::Conflict(msg),
            HandlerError::QuotaExceeded(msg) => GateError::Handler {
                kind: "quota_exceeded".to_string(),
                message: msg,
            },
            HandlerError::Failed { kind, message } => GateError::Handler { kind, message },
        }
    }
}

/// Handler result alias.
pub type HandlerResult = std::result::Result<Value, HandlerError>;

/// The executable part of a tool.
pub trait ToolHandler: Send + Sync {
    /// Perform the operation.
    fn execute(&self, args: &ValidatedArgs) -> HandlerResult;

    /// Describe what `execute` would do, without changing anything.
    ///
    /// Only called for confirmation-gated tools. Must be deterministic for
    /// identical arguments and backend state. The default echoes the
    /// arguments with `executed: false`.
    fn preview(&self, args: &ValidatedArgs) -> HandlerResult {
        Ok(serde_json::json!({
            "executed": false,
            "arguments": args.to_value(),
        }))
    }
}

/// Adapter turning closures into a handler.
pub struct FnHandler<E, P> {
    execute: E,
    preview: P,
}

impl<E, P> FnHandler<E, P>
where
    E: Fn(&ValidatedArgs) -> HandlerResult + Send + Sync,
    P: Fn(&ValidatedArgs) -> HandlerResult + Send + Sync,
{
    pub fn new(execute: E, preview: P) -> Self {
        Self { execute, preview }
    }
}

impl<E, P> ToolHandler for FnHandler<E, P>
where
    E: Fn(&ValidatedArgs) -> HandlerResult + Send + Sync,
    P: Fn(&ValidatedArgs) -> HandlerResult + Send + Sync,
{
    fn execute(&self, args: &ValidatedArgs) -> HandlerResult {
        (self.execute)(args)
    }

    fn preview(&self, args: &ValidatedArgs) -> HandlerResult {
        (self.preview)(args)
    }
}

/// Wrap a closure with the default preview.
pub fn handler_fn<E>(execute: E) -> ExecuteOnly<E>
where
    E: Fn(&ValidatedArgs) -> HandlerResult + Send + Sync,
{
    ExecuteOnly(execute)
}

/// Handler built from a single execute closure.
pub struct ExecuteOnly<E>(E);

impl<E> ToolHandler for ExecuteOnly<E>
where
    E: Fn(&ValidatedArgs) -> HandlerResult + Send + Sync,
{
    fn execute(&self, args: &ValidatedArgs) -> HandlerResult {
        (self.0)(args)
    }
}
