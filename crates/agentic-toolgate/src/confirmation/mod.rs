//! Confirmation: explicit approval for sensitive operations.
//!
//! The confirmation module provides:
//! - Boolean confirm flags (absent means preview)
//! - One-time confirmation tokens bound to an operation and target
//! - Approval requests moved through pending to approved to consumed by an
//!   out-of-band actor
//! - A ledger holding tokens and approvals with atomic consumption
//! - The validator deciding between preview and execution

pub mod approval;
pub mod ledger;
pub mod token;
pub mod validator;

use serde::{Deserialize, Serialize};

pub use approval::{ApprovalRequest, ApprovalState};
pub use ledger::{ConfirmationLedger, LedgerSnapshot};
pub use token::ConfirmationToken;
pub use validator::{ConfirmationValidator, Decision};

/// How a tool must be confirmed before it executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    /// Executes directly.
    None,
    /// `confirm=true` executes; anything else previews.
    Flag,
    /// A valid, unconsumed token bound to this operation and target executes.
    Token,
    /// An approved approval request bound to this operation and target executes.
    Approval,
}

impl ConfirmationMode {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Flag => "flag",
            Self::Token => "token",
            Self::Approval => "approval",
        }
    }
}

/// Confirmation material supplied with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmationParams {
    pub confirm: Option<bool>,
    pub token: Option<String>,
    pub approval_id: Option<String>,
}

impl ConfirmationParams {
    pub fn confirmed() -> Self {
        Self {
            confirm: Some(true),
            ..Self::default()
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn with_approval(approval_id: impl Into<String>) -> Self {
        Self {
            approval_id: Some(approval_id.into()),
            ..Self::default()
        }
    }

    /// Which kind of material was supplied, for audit entries.
    ///
    /// Never includes the token or approval id itself.
    pub fn method_label(&self) -> &'static str {
        if self.token.is_some() {
            "token"
        } else if self.approval_id.is_some() {
            "approval"
        } else if self.confirm.is_some() {
            "flag"
        } else {
            "none"
        }
    }
}
