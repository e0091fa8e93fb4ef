//! Tool definitions: one per operation.

use std::fmt;
use std::sync::Arc;

use crate::confirmation::ConfirmationMode;
use crate::error::{GateError, Result};
use crate::schema::{InputSchema, ValidatedArgs};
use crate::scope::{Scope, ScopeSet};

use super::handler::ToolHandler;

/// Everything the gateway needs to know about one tool.
///
/// Immutable once built; the registry hands out shared references.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// Every scope a caller must hold.
    pub required_scopes: ScopeSet,
    pub input_schema: InputSchema,
    pub confirmation: ConfirmationMode,
    /// Results are replayed for repeated idempotency keys.
    pub idempotent: bool,
    /// Argument naming the resource acted upon, bound into tokens and
    /// approvals.
    pub target_field: Option<String>,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn confirmation_required(&self) -> bool {
        self.confirmation != ConfirmationMode::None
    }

    /// Resource identifier for confirmation binding.
    ///
    /// The value of `target_field`, or the tool name when the tool declares
    /// no target.
    pub fn target_of(&self, args: &ValidatedArgs) -> String {
        self.target_field
            .as_deref()
            .and_then(|field| args.get(field))
            .map(|value| match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| self.name.clone())
    }

    /// JSON description for tool listings.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "required_scopes": self.required_scopes,
            "confirmation": self.confirmation.as_str(),
            "idempotent": self.idempotent,
            "inputSchema": self.input_schema.describe(),
        })
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("required_scopes", &self.required_scopes)
            .field("confirmation", &self.confirmation)
            .field("idempotent", &self.idempotent)
            .field("target_field", &self.target_field)
            .finish_non_exhaustive()
    }
}

/// Builder for tool definitions.
pub struct ToolDefinitionBuilder {
    name: String,
    description: String,
    required_scopes: ScopeSet,
    input_schema: InputSchema,
    confirmation: ConfirmationMode,
    idempotent: bool,
    target_field: Option<String>,
}

impl ToolDefinitionBuilder {
    /// Start building a tool with no scopes, no arguments and no confirmation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required_scopes: ScopeSet::new(),
            input_schema: InputSchema::empty(),
            confirmation: ConfirmationMode::None,
            idempotent: false,
            target_field: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Require a scope. Call once per scope the tool needs.
    pub fn scope(mut self, scope: Scope) -> Self {
        self.required_scopes = self.required_scopes.with(scope);
        self
    }

    pub fn schema(mut self, schema: InputSchema) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn confirmation(mut self, mode: ConfirmationMode) -> Self {
        self.confirmation = mode;
        self
    }

    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    pub fn target_field(mut self, field: impl Into<String>) -> Self {
        self.target_field = Some(field.into());
        self
    }

    /// Attach the handler and finalize.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidDefinition` for an empty or malformed
    /// name, a tool with no scopes, a `target_field` the schema does not
    /// declare, or a token or approval tool whose target is not a required
    /// field. Without a required target a token would authorize any
    /// arguments.
    pub fn build(self, handler: Arc<dyn ToolHandler>) -> Result<ToolDefinition> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
        if !valid_name {
            return Err(GateError::InvalidDefinition(format!(
                "tool name '{}' must be non-empty ASCII letters, digits, '_', '-' or '.'",
                self.name
            )));
        }
        if self.required_scopes.is_empty() {
            return Err(GateError::InvalidDefinition(format!(
                "tool '{}' must declare at least one scope",
                self.name
            )));
        }
        if let Some(field) = &self.target_field {
            if !self.input_schema.contains(field) {
                return Err(GateError::InvalidDefinition(format!(
                    "tool '{}' names target field '{field}' which its schema does not declare",
                    self.name
                )));
            }
        }
        if matches!(
            self.confirmation,
            ConfirmationMode::Token | ConfirmationMode::Approval
        ) {
            let required_target = self
                .target_field
                .as_deref()
                .and_then(|field| self.input_schema.get(field))
                .is_some_and(|spec| spec.required);
            if !required_target {
                return Err(GateError::InvalidDefinition(format!(
                    "tool '{}' uses {} confirmation and must name a required target field",
                    self.name,
                    self.confirmation.as_str()
                )));
            }
        }

        Ok(ToolDefinition {
            name: self.name,
            description: self.description,
            required_scopes: self.required_scopes,
            input_schema: self.input_schema,
            confirmation: self.confirmation,
            idempotent: self.idempotent,
            target_field: self.target_field,
            handler,
        })
    }
}
