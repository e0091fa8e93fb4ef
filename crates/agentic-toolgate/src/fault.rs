//! Operational fault channel.
//!
//! Failures of the gateway's own machinery (audit sink, idempotency store)
//! must not fail the caller's invocation and must not be confused with
//! business errors. They are reported here instead.

use std::sync::Mutex;

/// A fault in gateway infrastructure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationalFault {
    /// Component that failed ("audit_sink", "idempotency_store").
    pub component: &'static str,
    /// Tool being invoked when the fault happened.
    pub tool_name: String,
    pub message: String,
}

/// Destination for operational faults.
pub trait FaultReporter: Send + Sync {
    fn report(&self, fault: OperationalFault);
}

/// Reports faults through the `log` facade at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFaultReporter;

impl FaultReporter for LogFaultReporter {
    fn report(&self, fault: OperationalFault) {
        log::error!(
            "operational fault in {} while invoking {}: {}",
            fault.component,
            fault.tool_name,
            fault.message
        );
    }
}

/// Keeps faults in memory, for tests and health endpoints.
#[derive(Debug, Default)]
pub struct MemoryFaultReporter {
    faults: Mutex<Vec<OperationalFault>>,
}

impl MemoryFaultReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> Vec<OperationalFault> {
        self.faults.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

impl FaultReporter for MemoryFaultReporter {
    fn report(&self, fault: OperationalFault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(fault);
        }
    }
}
