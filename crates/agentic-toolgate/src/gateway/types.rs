//! Request and response types for the invocation gateway.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::confirmation::ConfirmationParams;
use crate::scope::{Scope, ScopeSet};

/// One tool call as presented by an agent.
///
/// Confirmation material travels beside the arguments, never inside
/// them, so closed schemas need not declare it.
#[derive(Debug, Clone, Default)]
pub struct InvocationRequest {
    pub caller_id: String,
    pub granted_scopes: ScopeSet,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
    pub idempotency_key: Option<String>,
    pub confirmation: ConfirmationParams,
}

impl InvocationRequest {
    pub fn new(caller_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            tool_name: tool_name.into(),
            ..Self::default()
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.granted_scopes = self.granted_scopes.with(scope);
        self
    }

    pub fn scopes(mut self, scopes: ScopeSet) -> Self {
        self.granted_scopes = scopes;
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Replace all arguments. Non-object values become an empty map.
    pub fn arguments(mut self, arguments: Value) -> Self {
        self.arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn confirm(mut self, confirm: bool) -> Self {
        self.confirmation.confirm = Some(confirm);
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.confirmation.token = Some(token.into());
        self
    }

    pub fn approval(mut self, approval_id: impl Into<String>) -> Self {
        self.confirmation.approval_id = Some(approval_id.into());
        self
    }
}

/// How a successful invocation was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The handler ran.
    Executed,
    /// Confirmation was withheld; the handler's preview is returned.
    Previewed,
    /// A stored result was returned for a repeated idempotency key.
    Replayed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::Previewed => "previewed",
            Self::Replayed => "replayed",
        }
    }
}

/// Successful result of `Gateway::invoke`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub tool: String,
    pub outcome: Outcome,
    pub result: Value,
}
