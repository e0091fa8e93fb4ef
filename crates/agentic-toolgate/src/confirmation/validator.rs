//! Confirmation validator: preview or execute.

use std::sync::Arc;

use crate::error::{GateError, Result};

use super::ledger::ConfirmationLedger;
use super::{ConfirmationMode, ConfirmationParams};

/// What the gateway should do with a request that passed confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run the handler.
    Execute,
    /// Return the handler's preview; change nothing.
    Preview,
}

/// Applies a tool's confirmation mode to the supplied parameters.
#[derive(Clone)]
pub struct ConfirmationValidator {
    ledger: Arc<ConfirmationLedger>,
}

impl ConfirmationValidator {
    pub fn new(ledger: Arc<ConfirmationLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<ConfirmationLedger> {
        &self.ledger
    }

    /// Decide between preview and execution.
    ///
    /// No confirmation material means preview. Material of the wrong kind
    /// for the mode, or material that fails its check, is an
    /// `Authorization` error. Token and approval checks consume on success.
    pub fn check(
        &self,
        mode: ConfirmationMode,
        params: &ConfirmationParams,
        operation: &str,
        target: &str,
    ) -> Result<Decision> {
        match mode {
            ConfirmationMode::None => Ok(Decision::Execute),

            ConfirmationMode::Flag => {
                if params.token.is_some() || params.approval_id.is_some() {
                    return Err(GateError::Authorization(format!(
                        "{operation} is confirmed with confirm=true, not a token or approval"
                    )));
                }
                if params.confirm.unwrap_or(false) {
                    Ok(Decision::Execute)
                } else {
                    Ok(Decision::Preview)
                }
            }

            ConfirmationMode::Token => match &params.token {
                Some(token) => {
                    self.ledger.consume_token(token, operation, target)?;
                    Ok(Decision::Execute)
                }
                None if params.confirm == Some(true) || params.approval_id.is_some() => {
                    Err(GateError::Authorization(format!(
                        "{operation} requires a confirmation token"
                    )))
                }
                None => Ok(Decision::Preview),
            },

            ConfirmationMode::Approval => match &params.approval_id {
                Some(id) => {
                    self.ledger.consume_approval(id, operation, target)?;
                    Ok(Decision::Execute)
                }
                None if params.confirm == Some(true) || params.token.is_some() => {
                    Err(GateError::Authorization(format!(
                        "{operation} requires an approved approval request"
                    )))
                }
                None => Ok(Decision::Preview),
            },
        }
    }
}
