//! Tool registry: one definition per operation.
//!
//! Each operation an agent can perform is its own registered tool with its
//! own scopes and closed schema. There is no catch-all tool dispatching on
//! an action string, so scope and validation cannot be bypassed by naming
//! a different action.

pub mod definition;
pub mod handler;
#[allow(clippy::module_inception)]
pub mod registry;

pub use definition::{ToolDefinition, ToolDefinitionBuilder};
pub use handler::{handler_fn, FnHandler, HandlerError, HandlerResult, ToolHandler};
pub use registry::ToolRegistry;
