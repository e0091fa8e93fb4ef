//! Audit logger: chains entries and hands them to a sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{GateError, Result};
use crate::fault::{FaultReporter, OperationalFault};

use super::chain::compute_entry_hash;
use super::entry::AuditEntry;
use super::sink::AuditSink;

#[derive(Debug, Default)]
struct ChainHead {
    next_sequence: u64,
    last_hash: Option<String>,
}

/// Assigns sequence numbers and hashes, then appends to the sink.
///
/// Recording never fails the caller. Sink errors go to the fault
/// reporter and the chain head stays where it was, so the next entry
/// links to the last one that actually landed.
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    faults: Arc<dyn FaultReporter>,
    head: Mutex<ChainHead>,
    failures: AtomicU64,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>, faults: Arc<dyn FaultReporter>) -> Self {
        Self {
            sink,
            faults,
            head: Mutex::new(ChainHead {
                next_sequence: 1,
                last_hash: None,
            }),
            failures: AtomicU64::new(0),
        }
    }

    /// Resume an existing chain after its last entry.
    pub fn with_head(mut self, last_sequence: u64, last_hash: impl Into<String>) -> Self {
        self.head = Mutex::new(ChainHead {
            next_sequence: last_sequence + 1,
            last_hash: Some(last_hash.into()),
        });
        self
    }

    /// Record one entry. Returns the chained entry when the sink accepted it.
    pub fn record(&self, entry: AuditEntry) -> Option<AuditEntry> {
        let tool_name = entry.tool_name.clone();
        match self.append_chained(entry) {
            Ok(recorded) => Some(recorded),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.faults.report(OperationalFault {
                    component: "audit_sink",
                    tool_name,
                    message: e.to_string(),
                });
                None
            }
        }
    }

    /// Number of entries the sink refused.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn append_chained(&self, mut entry: AuditEntry) -> Result<AuditEntry> {
        let mut head = self
            .head
            .lock()
            .map_err(|_| GateError::StorageError("audit chain lock poisoned".into()))?;

        entry.sequence = head.next_sequence;
        entry.previous_hash = head.last_hash.clone();
        entry.entry_hash = String::new();
        entry.entry_hash = compute_entry_hash(&entry)?;

        self.sink.append(&entry)?;

        head.next_sequence += 1;
        head.last_hash = Some(entry.entry_hash.clone());
        log::debug!(
            "audit #{} {} {}",
            entry.sequence,
            entry.tool_name,
            entry.terminal_state.as_str()
        );
        Ok(entry)
    }
}
