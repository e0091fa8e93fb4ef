//! Allowlist policy: the closed sets of identifiers tools may touch.
//!
//! A policy is built once at startup (usually from the config file),
//! canonicalized, and then shared read-only. Tool schemas take their
//! allowlist constraints from it, so two gateways with different policies
//! can run side by side in one process.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::schema::path::resolve_path;
use crate::schema::FieldConstraint;

/// Per-domain allowlists: database tables and columns, filesystem roots,
/// cloud environments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowlistPolicy {
    /// Table name to columns that may be read or written.
    #[serde(default)]
    pub tables: BTreeMap<String, BTreeSet<String>>,
    /// Filesystem roots paths must resolve under.
    #[serde(default)]
    pub roots: Vec<PathBuf>,
    /// Deployment environments (e.g. "staging").
    #[serde(default)]
    pub environments: BTreeSet<String>,
}

impl AllowlistPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow a table and its columns.
    pub fn table<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .insert(name.into(), columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.roots.push(path.into());
        self
    }

    pub fn environment(mut self, name: impl Into<String>) -> Self {
        self.environments.insert(name.into());
        self
    }

    /// Resolve every root to canonical absolute form.
    ///
    /// Fails with `InvalidConfig` for relative roots. Roots that do not
    /// exist yet are kept in normalized form.
    pub fn canonicalize(mut self) -> Result<Self> {
        let mut canonical = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            if !root.is_absolute() {
                return Err(GateError::InvalidConfig(format!(
                    "allowlisted root '{}' must be absolute",
                    root.display()
                )));
            }
            let resolved = resolve_path(root).map_err(GateError::InvalidConfig)?;
            if !canonical.contains(&resolved) {
                canonical.push(resolved);
            }
        }
        self.roots = canonical;
        Ok(self)
    }

    /// Constraint accepting any allowlisted table name.
    pub fn table_constraint(&self) -> FieldConstraint {
        FieldConstraint::allowlisted("table", self.tables.keys().cloned())
    }

    /// Constraint accepting columns allowlisted for `table`.
    ///
    /// Fails with `InvalidConfig` when the table is not in the policy.
    pub fn columns_constraint(&self, table: &str, max_items: Option<usize>) -> Result<FieldConstraint> {
        let allowed = self.tables.get(table).ok_or_else(|| {
            GateError::InvalidConfig(format!("table '{table}' is not in the allowlist policy"))
        })?;
        Ok(FieldConstraint::Columns {
            allowed: allowed.clone(),
            max_items,
        })
    }

    /// Constraint accepting paths under the allowlisted roots.
    pub fn path_constraint(&self) -> FieldConstraint {
        FieldConstraint::Path {
            roots: self.roots.clone(),
        }
    }

    /// Constraint accepting any allowlisted environment.
    pub fn environment_constraint(&self) -> FieldConstraint {
        FieldConstraint::allowlisted("environment", self.environments.iter().cloned())
    }

    pub fn is_table_allowed(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }
}
