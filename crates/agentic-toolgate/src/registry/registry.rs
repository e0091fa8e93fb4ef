//! The tool registry: name to definition.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{GateError, Result};

use super::definition::ToolDefinition;

/// Registered tools, keyed by unique name.
///
/// Tools are registered during startup. Once the registry is handed to a
/// `Gateway` it sits behind an `Arc` with no mutating access, so request
/// handling never races registration.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<ToolDefinition>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool.
    ///
    /// # Errors
    ///
    /// Returns `GateError::DuplicateTool` if a tool with the same name is
    /// already registered; the existing definition is kept.
    pub fn register(&mut self, definition: ToolDefinition) -> Result<()> {
        if self.tools.contains_key(&definition.name) {
            return Err(GateError::DuplicateTool(definition.name));
        }
        log::debug!(
            "registered tool {} (scopes: {})",
            definition.name,
            definition.required_scopes.to_strings().join(",")
        );
        self.tools
            .insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    /// Look up a tool by name.
    ///
    /// # Errors
    ///
    /// Returns `GateError::UnknownTool` if no tool has that name.
    pub fn lookup(&self, name: &str) -> Result<Arc<ToolDefinition>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| GateError::UnknownTool(name.to_string()))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// JSON descriptions of every tool, in name order.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::Value::Array(self.tools.values().map(|t| t.describe()).collect())
    }
}
