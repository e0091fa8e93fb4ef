//! One-time confirmation tokens.
//!
//! A token is issued by an approval flow for one operation on one target.
//! It authorizes exactly one execution: once consumed or expired it is
//! permanently invalid.

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// A confirmation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationToken {
    /// Opaque id (`atok_…`), the secret the caller presents.
    pub id: String,
    /// Tool name the token is bound to.
    pub operation: String,
    /// Resource the token is bound to.
    pub target: String,
    /// Issue time (microseconds since epoch).
    pub issued_at: u64,
    /// Expiry time (microseconds since epoch).
    pub expires_at: u64,
    pub consumed: bool,
    pub consumed_at: Option<u64>,
}

impl ConfirmationToken {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Check the token can authorize `operation` on `target` at `now`.
    ///
    /// Does not consume; the ledger marks consumption under its lock.
    pub fn check(&self, operation: &str, target: &str, now: u64) -> Result<()> {
        if self.consumed {
            return Err(GateError::Authorization(
                "confirmation token has already been used".into(),
            ));
        }
        if self.is_expired(now) {
            return Err(GateError::Authorization(
                "confirmation token has expired".into(),
            ));
        }
        if self.operation != operation {
            return Err(GateError::Authorization(format!(
                "confirmation token is bound to a different operation (expected {operation})"
            )));
        }
        if self.target != target {
            return Err(GateError::Authorization(format!(
                "confirmation token is bound to a different target (expected {target})"
            )));
        }
        Ok(())
    }
}
