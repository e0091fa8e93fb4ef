//! Audit hash chain.
//!
//! Each entry's hash covers its own content and the hash of the entry
//! before it, so removing, reordering, or editing an entry breaks every
//! link after it.

use crate::error::{GateError, Result};
use crate::ids::sha256_hex;

use super::entry::AuditEntry;

/// Compute the hash of an entry, ignoring its current `entry_hash`.
pub fn compute_entry_hash(entry: &AuditEntry) -> Result<String> {
    let mut unhashed = entry.clone();
    unhashed.entry_hash = String::new();
    let bytes =
        serde_json::to_vec(&unhashed).map_err(|e| GateError::SerializationError(e.to_string()))?;
    Ok(sha256_hex(&bytes))
}

/// Verify a sequence of entries (oldest first).
///
/// Checks every hash, every `previous_hash` link, and that sequence
/// numbers increase by one. A partial log starting mid-chain is accepted.
///
/// # Errors
///
/// Returns `GateError::AuditChainBroken` with the sequence number of the
/// first bad entry.
pub fn verify_audit_chain(entries: &[AuditEntry]) -> Result<()> {
    for (i, entry) in entries.iter().enumerate() {
        if compute_entry_hash(entry)? != entry.entry_hash {
            return Err(GateError::AuditChainBroken(entry.sequence));
        }
        if i > 0 {
            let prev = &entries[i - 1];
            if entry.previous_hash.as_deref() != Some(prev.entry_hash.as_str())
                || entry.sequence != prev.sequence + 1
            {
                return Err(GateError::AuditChainBroken(entry.sequence));
            }
        }
    }
    Ok(())
}
