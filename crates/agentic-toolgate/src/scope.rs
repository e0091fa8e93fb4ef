//! Scopes and the scope enforcer.
//!
//! A scope is a named permission tier. Tools declare the exact set of
//! scopes they need and a caller must hold every one of them:
//!   - `read`: observe state
//!   - `write`: create or modify state
//!   - `destructive`: delete or irreversibly alter state
//!
//! There is no implied ordering. Holding `destructive` does not grant
//! `write`; a tool that truncates a table declares both.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// A permission tier a caller may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Read,
    Write,
    Destructive,
}

impl Scope {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Destructive => "destructive",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "destructive" => Ok(Self::Destructive),
            other => Err(GateError::validation(
                "scopes",
                format!("unknown scope '{other}'"),
            )),
        }
    }
}

/// An ordered set of scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    /// An empty set.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse a list of scope names (e.g. from a token claim or CLI flag).
    pub fn parse<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|n| n.as_ref().parse::<Scope>())
            .collect::<Result<BTreeSet<_>>>()
            .map(Self)
    }

    /// Add a scope, returning the set for chaining.
    pub fn with(mut self, scope: Scope) -> Self {
        self.0.insert(scope);
        self
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }

    /// True when every scope in `required` is also in `self`.
    pub fn is_superset(&self, required: &ScopeSet) -> bool {
        self.0.is_superset(&required.0)
    }

    /// Scopes in `required` that `self` lacks, in stable order.
    pub fn missing_from(&self, required: &ScopeSet) -> Vec<Scope> {
        required.0.difference(&self.0).copied().collect()
    }

    /// Stable string list, used in audit entries.
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|s| s.as_str().to_string()).collect()
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<T: IntoIterator<Item = Scope>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Scope; N]> for ScopeSet {
    fn from(scopes: [Scope; N]) -> Self {
        scopes.into_iter().collect()
    }
}

/// Check whether `granted` covers every scope in `required`.
pub fn authorize(granted: &ScopeSet, required: &ScopeSet) -> bool {
    granted.is_superset(required)
}

/// Fail closed with `ScopeDenied` unless `granted` covers `required`.
pub fn enforce(tool: &str, granted: &ScopeSet, required: &ScopeSet) -> Result<()> {
    if authorize(granted, required) {
        return Ok(());
    }
    Err(GateError::ScopeDenied {
        tool: tool.to_string(),
        missing: granted.missing_from(required),
    })
}
