//! Invocation gateway: the only path from an agent to a tool handler.

pub mod engine;
pub mod types;

pub use engine::{Gateway, GatewayBuilder};
pub use types::{InvocationRequest, InvocationResponse, Outcome};
