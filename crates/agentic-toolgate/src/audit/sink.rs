//! Audit sinks: append-only destinations for audit entries.

use std::sync::Mutex;

use crate::error::{GateError, Result};

use super::entry::AuditEntry;

/// Append-only destination for audit entries.
///
/// Errors are reported by the logger on the fault channel; they never
/// reach the invoking caller.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &AuditEntry) -> Result<()>;
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all entries in append order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, entry: &AuditEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| GateError::StorageError("audit sink lock poisoned".into()))?
            .push(entry.clone());
        Ok(())
    }
}
