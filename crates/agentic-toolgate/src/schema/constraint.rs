//! Field constraints and closed input schemas.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Constraint on a single argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldConstraint {
    Boolean,
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
    },
    /// Value must be one of a fixed set of strings.
    Enum { values: Vec<String> },
    /// Value must be one identifier from an allowlist (tables, environments).
    Allowlisted {
        /// What the identifier names, used in error messages ("table").
        kind: String,
        allowed: BTreeSet<String>,
    },
    /// Value must be a list of distinct allowlisted column names.
    Columns {
        allowed: BTreeSet<String>,
        max_items: Option<usize>,
    },
    /// Value must be a path that resolves under one of these roots.
    Path { roots: Vec<PathBuf> },
}

impl FieldConstraint {
    /// Any string with an upper length bound.
    pub fn string(max_len: usize) -> Self {
        Self::String {
            min_len: None,
            max_len: Some(max_len),
        }
    }

    /// A non-empty string with an upper length bound.
    pub fn non_empty_string(max_len: usize) -> Self {
        Self::String {
            min_len: Some(1),
            max_len: Some(max_len),
        }
    }

    /// An integer in `[min, max]`.
    pub fn integer(min: i64, max: i64) -> Self {
        Self::Integer {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allowlisted<I, S>(kind: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Allowlisted {
            kind: kind.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Short type name, used in error messages and tool descriptions.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer { .. } => "integer",
            Self::Number { .. } => "number",
            Self::String { .. } | Self::Enum { .. } | Self::Allowlisted { .. } => "string",
            Self::Columns { .. } => "array",
            Self::Path { .. } => "path",
        }
    }
}

/// Declaration of one argument a tool accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub constraint: FieldConstraint,
    pub required: bool,
    /// Never logged in clear, regardless of its name.
    pub sensitive: bool,
    pub description: Option<String>,
}

impl FieldSpec {
    /// A field that must be present.
    pub fn required(name: impl Into<String>, constraint: FieldConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
            required: true,
            sensitive: false,
            description: None,
        }
    }

    /// A field that may be omitted.
    pub fn optional(name: impl Into<String>, constraint: FieldConstraint) -> Self {
        Self {
            required: false,
            ..Self::required(name, constraint)
        }
    }

    /// Mark the field as sensitive (redacted in audit entries).
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A closed set of field declarations.
///
/// Arguments not declared here are rejected by the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl InputSchema {
    /// A schema accepting no arguments.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a field declaration. A later declaration with the same name
    /// replaces the earlier one.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.insert(spec.name.clone(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate declarations in name order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|f| f.sensitive)
    }

    /// JSON description in the shape agents expect for tool listings.
    pub fn describe(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .fields
            .values()
            .map(|f| {
                let mut prop = serde_json::json!({
                    "type": f.constraint.type_name(),
                    "constraint": f.constraint,
                });
                if let Some(desc) = &f.description {
                    prop["description"] = serde_json::Value::String(desc.clone());
                }
                (f.name.clone(), prop)
            })
            .collect();
        let required: Vec<&str> = self
            .fields
            .values()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}
