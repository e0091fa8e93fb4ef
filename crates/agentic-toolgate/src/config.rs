//! Gateway configuration: loaded once at process start.
//!
//! File format:
//! ```json
//! {
//!     "version": 1,
//!     "gateway": { "idempotency_ttl_secs": 86400, ... },
//!     "policy": { "tables": {...}, "roots": [...], "environments": [...] }
//! }
//! ```
//!
//! Every gateway setting has a default, so `{"version": 1}` is a valid
//! (if empty) configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::policy::AllowlistPolicy;

const CONFIG_FILE_VERSION: u32 = 1;

/// Tunables for the gateway and its stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// How long an idempotency record is replayed.
    pub idempotency_ttl_secs: u64,
    /// How long a concurrent caller waits for the winner of the same key.
    pub in_flight_wait_ms: u64,
    /// Default lifetime of issued confirmation tokens.
    pub token_ttl_secs: u64,
    /// Strings longer than this are replaced by a digest in audit entries.
    pub max_logged_string_len: usize,
    /// Arrays longer than this are cut in audit entries.
    pub max_logged_array_len: usize,
    /// Additional field-name fragments treated as secrets.
    pub extra_secret_patterns: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            idempotency_ttl_secs: 86_400,
            in_flight_wait_ms: 2_000,
            token_ttl_secs: 900,
            max_logged_string_len: 256,
            max_logged_array_len: 32,
            extra_secret_patterns: Vec::new(),
        }
    }
}

impl GatewayConfig {
    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_secs)
    }

    pub fn in_flight_wait(&self) -> Duration {
        Duration::from_millis(self.in_flight_wait_ms)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolgateConfig {
    pub version: u32,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub policy: AllowlistPolicy,
}

impl Default for ToolgateConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FILE_VERSION,
            gateway: GatewayConfig::default(),
            policy: AllowlistPolicy::default(),
        }
    }
}

impl ToolgateConfig {
    /// Parse a configuration document and canonicalize its policy.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidFileFormat` for malformed JSON or an
    /// unsupported version, and `GateError::InvalidConfig` for bad policy
    /// entries.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GateError::InvalidFileFormat(format!("failed to parse config: {e}")))?;
        config.finish()
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidConfig` when the file is missing, plus
    /// everything `from_json` returns.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GateError::InvalidConfig(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            GateError::InvalidFileFormat(format!(
                "failed to parse config file {}: {e}",
                path.display()
            ))
        })?;
        log::debug!("loaded toolgate config from {}", path.display());
        config.finish()
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GateError::SerializationError(e.to_string()))?;
        std::fs::write(path, json.as_bytes())?;
        Ok(())
    }

    fn finish(mut self) -> Result<Self> {
        if self.version != CONFIG_FILE_VERSION {
            return Err(GateError::InvalidFileFormat(format!(
                "unsupported config version {} (expected {CONFIG_FILE_VERSION})",
                self.version
            )));
        }
        self.policy = self.policy.canonicalize()?;
        Ok(self)
    }
}

/// Default state directory: `~/.agentic/toolgate`.
///
/// Returns `None` when `HOME` is not set.
pub fn default_state_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".agentic").join("toolgate"))
}
