//! Argument sanitization for audit entries.
//!
//! Runs before anything reaches a sink:
//!   - fields the schema marks sensitive, and fields whose name contains a
//!     secret pattern at any depth, become
//!     `{"redacted": true, "len": n, "sha256": "<16 hex>"}`
//!   - strings over the length limit become
//!     `{"truncated": true, "len": n, "sha256": "<16 hex>"}`
//!   - arrays over the item limit keep their head plus a marker
//!   - nesting past `MAX_DEPTH` is cut

use serde_json::{json, Map, Value};

use crate::config::GatewayConfig;
use crate::ids::short_hash;
use crate::schema::InputSchema;

/// Field-name fragments always treated as secrets.
pub const SECRET_PATTERNS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "credential",
    "authorization",
    "private_key",
];

const MAX_DEPTH: usize = 8;

/// Redacts and bounds argument values.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    max_string_len: usize,
    max_array_len: usize,
    patterns: Vec<String>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(&GatewayConfig::default())
    }
}

impl Sanitizer {
    pub fn new(config: &GatewayConfig) -> Self {
        let mut patterns: Vec<String> = SECRET_PATTERNS.iter().map(|p| p.to_string()).collect();
        patterns.extend(
            config
                .extra_secret_patterns
                .iter()
                .map(|p| p.to_ascii_lowercase()),
        );
        Self {
            max_string_len: config.max_logged_string_len,
            max_array_len: config.max_logged_array_len,
            patterns,
        }
    }

    /// True when `name` contains a secret pattern (case-insensitive).
    pub fn is_secret_name(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }

    /// True when a top-level field must never be logged in clear.
    pub fn is_secret_field(&self, schema: Option<&InputSchema>, name: &str) -> bool {
        schema.is_some_and(|s| s.is_sensitive(name)) || self.is_secret_name(name)
    }

    /// Sanitize a top-level argument map.
    ///
    /// `schema` is `None` when the tool is unknown; name patterns still apply.
    pub fn sanitize_arguments(&self, schema: Option<&InputSchema>, args: &Map<String, Value>) -> Value {
        let out: Map<String, Value> = args
            .iter()
            .map(|(name, value)| {
                let clean = if self.is_secret_field(schema, name) {
                    redact(value)
                } else {
                    self.sanitize_value(value, 1)
                };
                (name.clone(), clean)
            })
            .collect();
        Value::Object(out)
    }

    fn sanitize_value(&self, value: &Value, depth: usize) -> Value {
        if depth > MAX_DEPTH {
            return json!({"truncated": true, "depth": MAX_DEPTH});
        }
        match value {
            Value::String(s) if s.len() > self.max_string_len => json!({
                "truncated": true,
                "len": s.len(),
                "sha256": short_hash(s.as_bytes()),
            }),
            Value::Array(items) => {
                let mut out: Vec<Value> = items
                    .iter()
                    .take(self.max_array_len)
                    .map(|v| self.sanitize_value(v, depth + 1))
                    .collect();
                if items.len() > self.max_array_len {
                    out.push(json!({"omitted_items": items.len() - self.max_array_len}));
                }
                Value::Array(out)
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let clean = if self.is_secret_name(k) {
                            redact(v)
                        } else {
                            self.sanitize_value(v, depth + 1)
                        };
                        (k.clone(), clean)
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Replace a value by its length and a short digest.
pub fn redact(value: &Value) -> Value {
    let bytes = match value {
        Value::String(s) => s.as_bytes().to_vec(),
        other => other.to_string().into_bytes(),
    };
    json!({
        "redacted": true,
        "len": bytes.len(),
        "sha256": short_hash(&bytes),
    })
}
