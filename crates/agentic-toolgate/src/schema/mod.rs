//! Input schemas: closed, per-tool argument contracts.
//!
//! The schema module provides:
//! - Field constraints (types, bounds, enums, allowlists, path roots)
//! - Closed input schemas where unknown fields are rejected
//! - Symlink-aware path containment
//! - A pure validator producing `ValidatedArgs` for handlers

pub mod constraint;
pub mod path;
pub mod validate;

pub use constraint::{FieldConstraint, FieldSpec, InputSchema};
pub use path::{resolve_path, resolve_under_roots};
pub use validate::{validate, ValidatedArgs};
