//! Approval requests.
//!
//! ```text
//! pending ──approve──▶ approved ──execute──▶ consumed
//!    │
//!    └────reject────▶ rejected
//! ```
//!
//! Only an approved request authorizes execution, and executing consumes
//! it so it cannot be replayed.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
    Consumed,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Consumed => "consumed",
        }
    }

    /// Parse a state name (CLI filters).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "consumed" => Some(Self::Consumed),
            _ => None,
        }
    }
}

/// A request for out-of-band approval of one operation on one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Opaque id (`aapr_…`).
    pub id: String,
    pub operation: String,
    pub target: String,
    pub state: ApprovalState,
    /// Creation time (microseconds since epoch).
    pub created_at: u64,
    /// Time of the approve/reject decision.
    pub decided_at: Option<u64>,
    /// Who approved or rejected.
    pub decided_by: Option<String>,
    pub note: Option<String>,
}
