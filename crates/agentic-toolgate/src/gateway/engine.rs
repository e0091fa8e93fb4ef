//! The invocation gateway.
//!
//! Every call walks the same pipeline:
//!
//! ```text
//! lookup -> scope check -> validation -> idempotency -> confirmation -> handler
//! ```
//!
//! and leaves exactly one audit entry, whichever stage it stops at.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::audit::{AuditEntry, AuditLogger, AuditSink, MemoryAuditSink, Sanitizer, TerminalState};
use crate::config::GatewayConfig;
use crate::confirmation::{
    ApprovalRequest, ConfirmationLedger, ConfirmationMode, ConfirmationToken,
    ConfirmationValidator, Decision,
};
use crate::error::{GateError, Result};
use crate::fault::{FaultReporter, LogFaultReporter, OperationalFault};
use crate::ids::short_hash;
use crate::idempotency::{IdempotencyRecord, IdempotencyStore, MemoryIdempotencyStore, Reservation};
use crate::registry::{ToolDefinition, ToolRegistry};
use crate::schema::{validate, ValidatedArgs};
use crate::scope::{self, Scope};
use crate::time::{duration_micros, now_micros};

use super::types::{InvocationRequest, InvocationResponse, Outcome};

/// Builder for [`Gateway`]. Every collaborator has an in-memory default.
pub struct GatewayBuilder {
    registry: ToolRegistry,
    idempotency: Option<Arc<dyn IdempotencyStore>>,
    ledger: Option<Arc<ConfirmationLedger>>,
    sink: Option<Arc<dyn AuditSink>>,
    faults: Option<Arc<dyn FaultReporter>>,
    audit_head: Option<(u64, String)>,
    config: GatewayConfig,
}

impl GatewayBuilder {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            idempotency: None,
            ledger: None,
            sink: None,
            faults: None,
            audit_head: None,
            config: GatewayConfig::default(),
        }
    }

    pub fn idempotency_store(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.idempotency = Some(store);
        self
    }

    pub fn ledger(mut self, ledger: Arc<ConfirmationLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Continue an existing audit chain after (sequence, hash).
    pub fn audit_head(mut self, last_sequence: u64, last_hash: impl Into<String>) -> Self {
        self.audit_head = Some((last_sequence, last_hash.into()));
        self
    }

    pub fn fault_reporter(mut self, faults: Arc<dyn FaultReporter>) -> Self {
        self.faults = Some(faults);
        self
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Gateway {
        let faults = self
            .faults
            .unwrap_or_else(|| Arc::new(LogFaultReporter) as Arc<dyn FaultReporter>);
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(MemoryAuditSink::new()) as Arc<dyn AuditSink>);
        let mut audit = AuditLogger::new(sink, faults.clone());
        if let Some((sequence, hash)) = self.audit_head {
            audit = audit.with_head(sequence, hash);
        }
        let ledger = self
            .ledger
            .unwrap_or_else(|| Arc::new(ConfirmationLedger::new()));

        Gateway {
            registry: Arc::new(self.registry),
            idempotency: self
                .idempotency
                .unwrap_or_else(|| {
                    Arc::new(MemoryIdempotencyStore::new()) as Arc<dyn IdempotencyStore>
                }),
            confirmations: ConfirmationValidator::new(ledger),
            audit,
            faults,
            sanitizer: Sanitizer::new(&self.config),
            config: self.config,
        }
    }
}

/// Single entry point for every tool invocation.
///
/// `Send + Sync`; share it behind an `Arc` and call `invoke` from any
/// number of threads.
pub struct Gateway {
    registry: Arc<ToolRegistry>,
    idempotency: Arc<dyn IdempotencyStore>,
    confirmations: ConfirmationValidator,
    audit: AuditLogger,
    faults: Arc<dyn FaultReporter>,
    sanitizer: Sanitizer,
    config: GatewayConfig,
}

/// Result of claiming an idempotency key.
enum KeyClaim<'a> {
    /// No key supplied, or the tool is not idempotent.
    Unkeyed,
    Held(KeyGuard<'a>),
    Replay(IdempotencyRecord),
    Busy,
}

/// A held reservation. Released on drop unless completed.
struct KeyGuard<'a> {
    store: &'a dyn IdempotencyStore,
    faults: &'a dyn FaultReporter,
    key: &'a str,
    tool: &'a str,
    fingerprint: &'a str,
    settled: bool,
}

impl KeyGuard<'_> {
    fn complete(mut self, result: Value, ttl: Duration) {
        match self
            .store
            .complete(self.key, self.tool, self.fingerprint, result, ttl, now_micros())
        {
            Ok(_) => self.settled = true,
            Err(e) => self.report(&e),
        }
    }

    fn report(&self, error: &GateError) {
        self.faults.report(OperationalFault {
            component: "idempotency_store",
            tool_name: self.tool.to_string(),
            message: error.to_string(),
        });
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(e) = self.store.release(self.key, self.tool) {
            self.report(&e);
        }
    }
}

impl Gateway {
    pub fn builder(registry: ToolRegistry) -> GatewayBuilder {
        GatewayBuilder::new(registry)
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<ConfirmationLedger> {
        self.confirmations.ledger()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Audit entries the sink refused so far.
    pub fn audit_failures(&self) -> u64 {
        self.audit.failure_count()
    }

    /// Run one tool call through the full pipeline.
    ///
    /// Exactly one audit entry is recorded per call. The handler is invoked
    /// at most once and never retried.
    ///
    /// # Errors
    ///
    /// `UnknownTool`, `ScopeDenied`, `Validation`, `Authorization`,
    /// `InFlight`, `Conflict` for an idempotency key reused with different
    /// arguments, the handler's own error, or an operational error when
    /// the idempotency store fails before execution.
    pub fn invoke(&self, request: InvocationRequest) -> Result<InvocationResponse> {
        let started = Instant::now();
        log::debug!("{} -> {}: received", request.caller_id, request.tool_name);

        let tool = match self.registry.lookup(&request.tool_name) {
            Ok(tool) => tool,
            Err(e) => return self.fail(&request, None, started, TerminalState::UnknownTool, e),
        };

        if let Err(e) = scope::enforce(&tool.name, &request.granted_scopes, &tool.required_scopes) {
            log::warn!("{} denied on {}: {e}", request.caller_id, tool.name);
            return self.fail(&request, Some(&tool), started, TerminalState::ScopeDenied, e);
        }
        log::debug!("{} -> {}: scope checked", request.caller_id, tool.name);

        let args = match self.validate(&tool, &request) {
            Ok(args) => args,
            Err(e) => {
                return self.fail(&request, Some(&tool), started, TerminalState::ValidationFailed, e)
            }
        };
        let target = tool.target_of(&args);
        let fingerprint = args.fingerprint();
        log::debug!("{} -> {}: validated", request.caller_id, tool.name);

        let guard = match self.claim_key(&tool, &request, &fingerprint) {
            Ok(KeyClaim::Unkeyed) => None,
            Ok(KeyClaim::Held(guard)) => Some(guard),
            Ok(KeyClaim::Replay(record)) if !record.matches(&fingerprint) => {
                log::warn!(
                    "{} reused an idempotency key on {} with different arguments",
                    request.caller_id,
                    tool.name
                );
                let e = GateError::Conflict(format!(
                    "idempotency key was already used for {} with different arguments",
                    tool.name
                ));
                return self.fail(&request, Some(&tool), started, TerminalState::KeyConflict, e);
            }
            Ok(KeyClaim::Replay(record)) => {
                log::debug!("{} -> {}: idempotent hit", request.caller_id, tool.name);
                self.record(&request, Some(&tool), started, TerminalState::IdempotentHit, None);
                return Ok(InvocationResponse {
                    tool: tool.name.clone(),
                    outcome: Outcome::Replayed,
                    result: record.result,
                });
            }
            Ok(KeyClaim::Busy) => {
                let e = GateError::InFlight {
                    tool: tool.name.clone(),
                };
                return self.fail(&request, Some(&tool), started, TerminalState::InFlight, e);
            }
            Err(e) => {
                self.faults.report(OperationalFault {
                    component: "idempotency_store",
                    tool_name: tool.name.clone(),
                    message: e.to_string(),
                });
                return self.fail(&request, Some(&tool), started, TerminalState::StoreFault, e);
            }
        };

        let decision = match self.confirmations.check(
            tool.confirmation,
            &request.confirmation,
            &tool.name,
            &target,
        ) {
            Ok(decision) => decision,
            Err(e) => {
                log::warn!("{} confirmation failed on {}: {e}", request.caller_id, tool.name);
                return self.fail(
                    &request,
                    Some(&tool),
                    started,
                    TerminalState::ConfirmationFailed,
                    e,
                );
            }
        };
        log::debug!(
            "{} -> {}: confirmation checked ({:?})",
            request.caller_id,
            tool.name,
            decision
        );

        if decision == Decision::Preview {
            return match tool.handler.preview(&args) {
                Ok(result) => {
                    self.record(&request, Some(&tool), started, TerminalState::Previewed, None);
                    Ok(InvocationResponse {
                        tool: tool.name.clone(),
                        outcome: Outcome::Previewed,
                        result,
                    })
                }
                Err(e) => self.fail(
                    &request,
                    Some(&tool),
                    started,
                    TerminalState::HandlerError,
                    e.into(),
                ),
            };
        }

        match tool.handler.execute(&args) {
            Ok(result) => {
                if let Some(guard) = guard {
                    guard.complete(result.clone(), self.config.idempotency_ttl());
                }
                if tool.required_scopes.contains(Scope::Destructive) {
                    log::info!("{} executed {} on {}", request.caller_id, tool.name, target);
                }
                self.record(&request, Some(&tool), started, TerminalState::Success, None);
                Ok(InvocationResponse {
                    tool: tool.name.clone(),
                    outcome: Outcome::Executed,
                    result,
                })
            }
            Err(e) => {
                let e = GateError::from(e);
                log::debug!("{} -> {}: handler error {}", request.caller_id, tool.name, e.kind());
                self.fail(&request, Some(&tool), started, TerminalState::HandlerError, e)
            }
        }
    }

    /// Issue a confirmation token for a token-gated call.
    ///
    /// The request goes through lookup, scope check and validation first;
    /// the token is bound to the tool name and the call's target.
    pub fn issue_token(&self, request: InvocationRequest) -> Result<ConfirmationToken> {
        let (tool, target) = self.prepare(&request, ConfirmationMode::Token)?;
        self.ledger()
            .issue(&tool.name, &target, self.config.token_ttl())
    }

    /// Open an approval request for an approval-gated call.
    pub fn request_approval(&self, request: InvocationRequest) -> Result<ApprovalRequest> {
        let (tool, target) = self.prepare(&request, ConfirmationMode::Approval)?;
        self.ledger().create_approval(&tool.name, &target)
    }

    fn prepare(
        &self,
        request: &InvocationRequest,
        mode: ConfirmationMode,
    ) -> Result<(Arc<ToolDefinition>, String)> {
        let tool = self.registry.lookup(&request.tool_name)?;
        if tool.confirmation != mode {
            return Err(GateError::Conflict(format!(
                "{} is confirmed by {}, not {}",
                tool.name,
                tool.confirmation.as_str(),
                mode.as_str()
            )));
        }
        scope::enforce(&tool.name, &request.granted_scopes, &tool.required_scopes)?;
        let target = tool.target_of(&self.validate(&tool, request)?);
        Ok((tool, target))
    }

    fn validate(&self, tool: &ToolDefinition, request: &InvocationRequest) -> Result<ValidatedArgs> {
        validate(&tool.input_schema, &request.arguments).map_err(|e| match e {
            GateError::Validation { field, .. }
                if self
                    .sanitizer
                    .is_secret_field(Some(&tool.input_schema), &field) =>
            {
                GateError::validation(field, "value rejected")
            }
            other => other,
        })
    }

    fn claim_key<'a>(
        &'a self,
        tool: &'a ToolDefinition,
        request: &'a InvocationRequest,
        fingerprint: &'a str,
    ) -> Result<KeyClaim<'a>> {
        let Some(key) = request.idempotency_key.as_deref() else {
            return Ok(KeyClaim::Unkeyed);
        };
        if !tool.idempotent {
            log::debug!("{}: ignoring idempotency key on non-idempotent tool", tool.name);
            return Ok(KeyClaim::Unkeyed);
        }

        let reservation =
            self.idempotency
                .reserve(key, &tool.name, self.config.in_flight_wait(), now_micros())?;
        Ok(match reservation {
            Reservation::Acquired => KeyClaim::Held(KeyGuard {
                store: self.idempotency.as_ref(),
                faults: self.faults.as_ref(),
                key,
                tool: &tool.name,
                fingerprint,
                settled: false,
            }),
            Reservation::Completed(record) => KeyClaim::Replay(record),
            Reservation::InFlight => KeyClaim::Busy,
        })
    }

    fn fail<T>(
        &self,
        request: &InvocationRequest,
        tool: Option<&ToolDefinition>,
        started: Instant,
        terminal: TerminalState,
        error: GateError,
    ) -> Result<T> {
        self.record(request, tool, started, terminal, Some(&error));
        Err(error)
    }

    fn record(
        &self,
        request: &InvocationRequest,
        tool: Option<&ToolDefinition>,
        started: Instant,
        terminal: TerminalState,
        error: Option<&GateError>,
    ) {
        let mut entry = AuditEntry::new(&request.tool_name, &request.caller_id, terminal);
        entry.scopes = request.granted_scopes.to_strings();
        entry.sanitized_arguments = self
            .sanitizer
            .sanitize_arguments(tool.map(|t| &t.input_schema), &request.arguments);
        entry.error_type = error.map(|e| e.kind().to_string());
        entry.error_message = error.map(|e| e.to_string());
        entry.duration_micros = duration_micros(started.elapsed());
        entry.idempotency_key_hash = request
            .idempotency_key
            .as_deref()
            .map(|k| short_hash(k.as_bytes()));
        entry.confirmation = request.confirmation.method_label().to_string();
        self.audit.record(entry);
    }
}
