//! Argument validation against a closed input schema.
//!
//! Validation is pure: it never touches the idempotency store, the
//! confirmation ledger, or any backend. The only outside reads are the
//! filesystem metadata lookups needed to resolve symbolic links in path
//! fields.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use super::constraint::{FieldConstraint, FieldSpec, InputSchema};
use super::path::resolve_under_roots;
use crate::error::{GateError, Result};

/// Arguments that passed validation, ready for a handler.
///
/// Path fields hold their canonical absolute form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    /// Boolean field, `false` when absent.
    pub fn flag(&self, name: &str) -> bool {
        self.0.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// String-list field (e.g. validated columns), empty when absent.
    pub fn strings(&self, name: &str) -> Vec<String> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// SHA-256 hex of the arguments.
    ///
    /// `serde_json::Map` keeps keys sorted (no `preserve_order`), so equal
    /// arguments give the same digest whatever order the caller sent them in.
    pub fn fingerprint(&self) -> String {
        crate::ids::sha256_hex(self.to_value().to_string().as_bytes())
    }
}

/// Validate `args` against `schema`.
///
/// Fails with `GateError::Validation` naming the first offending field.
/// Unknown fields are checked first, in name order, so an injected field
/// is reported even when other fields are also wrong.
pub fn validate(schema: &InputSchema, args: &Map<String, Value>) -> Result<ValidatedArgs> {
    let mut unknown: Vec<&String> = args.keys().filter(|k| !schema.contains(k)).collect();
    unknown.sort();
    if let Some(field) = unknown.first() {
        return Err(GateError::validation(
            field.as_str(),
            "field is not declared by this tool",
        ));
    }

    let mut out = Map::new();
    for spec in schema.fields() {
        match args.get(&spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    return Err(GateError::validation(&spec.name, "field is required"));
                }
            }
            Some(value) => {
                let checked = check_field(spec, value)?;
                out.insert(spec.name.clone(), checked);
            }
        }
    }

    Ok(ValidatedArgs(out))
}

fn check_field(spec: &FieldSpec, value: &Value) -> Result<Value> {
    let field = spec.name.as_str();
    let fail = |reason: String| GateError::validation(field, reason);

    match &spec.constraint {
        FieldConstraint::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(fail(type_mismatch("boolean", value))),
        },

        FieldConstraint::Integer { min, max } => {
            let n = value
                .as_i64()
                .ok_or_else(|| fail(type_mismatch("integer", value)))?;
            if let Some(min) = min {
                if n < *min {
                    return Err(fail(format!("{n} is below the minimum {min}")));
                }
            }
            if let Some(max) = max {
                if n > *max {
                    return Err(fail(format!("{n} is above the maximum {max}")));
                }
            }
            Ok(value.clone())
        }

        FieldConstraint::Number { min, max } => {
            let n = value
                .as_f64()
                .ok_or_else(|| fail(type_mismatch("number", value)))?;
            if let Some(min) = min {
                if n < *min {
                    return Err(fail(format!("{n} is below the minimum {min}")));
                }
            }
            if let Some(max) = max {
                if n > *max {
                    return Err(fail(format!("{n} is above the maximum {max}")));
                }
            }
            Ok(value.clone())
        }

        FieldConstraint::String { min_len, max_len } => {
            let s = value
                .as_str()
                .ok_or_else(|| fail(type_mismatch("string", value)))?;
            let len = s.chars().count();
            if let Some(min) = min_len {
                if len < *min {
                    return Err(fail(format!("length {len} is below the minimum {min}")));
                }
            }
            if let Some(max) = max_len {
                if len > *max {
                    return Err(fail(format!("length {len} exceeds the maximum {max}")));
                }
            }
            Ok(value.clone())
        }

        FieldConstraint::Enum { values } => {
            let s = value
                .as_str()
                .ok_or_else(|| fail(type_mismatch("string", value)))?;
            if values.iter().any(|v| v == s) {
                Ok(value.clone())
            } else {
                Err(fail(format!(
                    "'{s}' is not one of: {}",
                    values.join(", ")
                )))
            }
        }

        FieldConstraint::Allowlisted { kind, allowed } => {
            let s = value
                .as_str()
                .ok_or_else(|| fail(type_mismatch("string", value)))?;
            if allowed.contains(s) {
                Ok(value.clone())
            } else {
                Err(fail(format!("{kind} '{s}' is not in the allowlist")))
            }
        }

        FieldConstraint::Columns { allowed, max_items } => {
            let items = value
                .as_array()
                .ok_or_else(|| fail(type_mismatch("array of column names", value)))?;
            if items.is_empty() {
                return Err(fail("at least one column is required".to_string()));
            }
            if let Some(max) = max_items {
                if items.len() > *max {
                    return Err(fail(format!(
                        "{} columns requested, at most {max} allowed",
                        items.len()
                    )));
                }
            }
            let mut seen = BTreeSet::new();
            for item in items {
                let name = item
                    .as_str()
                    .ok_or_else(|| fail(type_mismatch("column name", item)))?;
                if !allowed.contains(name) {
                    return Err(fail(format!("column '{name}' is not in the allowlist")));
                }
                if !seen.insert(name) {
                    return Err(fail(format!("column '{name}' is listed twice")));
                }
            }
            Ok(value.clone())
        }

        FieldConstraint::Path { roots } => {
            let s = value
                .as_str()
                .ok_or_else(|| fail(type_mismatch("path string", value)))?;
            let resolved = resolve_under_roots(s, roots).map_err(fail)?;
            let canonical = resolved
                .to_str()
                .ok_or_else(|| fail("resolved path is not valid UTF-8".to_string()))?;
            Ok(Value::String(canonical.to_string()))
        }
    }
}

fn type_mismatch(expected: &str, value: &Value) -> String {
    let actual = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("expected {expected}, got {actual}")
}
