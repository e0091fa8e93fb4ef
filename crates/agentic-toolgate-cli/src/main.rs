//! AgenticToolgate CLI: `tgate` command.
//!
//! Operator side of the gateway: check the allowlist policy, test path
//! containment, issue confirmation tokens, decide approval requests, and
//! inspect or verify the audit trail.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use agentic_toolgate::audit::{verify_audit_chain, AuditEntry, JsonlAuditSink};
use agentic_toolgate::config::{default_state_dir, GatewayConfig, ToolgateConfig};
use agentic_toolgate::confirmation::{ApprovalState, ConfirmationLedger, ConfirmationToken};
use agentic_toolgate::policy::AllowlistPolicy;
use agentic_toolgate::schema::resolve_under_roots;
use agentic_toolgate::storage::{AUDIT_FILE, CONFIG_FILE, LEDGER_FILE};
use agentic_toolgate::time::now_micros;

// ── Directory helpers ─────────────────────────────────────────────────────────

fn state_dir(dir: Option<&Path>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => default_state_dir().ok_or_else(|| anyhow!("HOME is not set; pass --dir")),
    }
}

/// The shared confirmation ledger. Every change is a locked
/// read-modify-write of the file, so a running gateway is never overwritten.
fn open_ledger(dir: &Path) -> Result<ConfirmationLedger> {
    let path = dir.join(LEDGER_FILE);
    log::debug!("confirmation ledger: {}", path.display());
    ConfirmationLedger::open(&path)
        .with_context(|| format!("failed to open confirmation ledger {}", path.display()))
}

/// Gateway settings from `config.json` when present, defaults otherwise.
fn gateway_config(dir: &Path) -> Result<GatewayConfig> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        log::debug!("no config at {}; using gateway defaults", path.display());
        return Ok(GatewayConfig::default());
    }
    let config = ToolgateConfig::load(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(config.gateway)
}

// ── Time formatting helpers ───────────────────────────────────────────────────

fn micros_to_datetime(micros: u64) -> String {
    let secs = (micros / 1_000_000) as i64;
    chrono::DateTime::from_timestamp(secs, 0)
        .unwrap_or(chrono::DateTime::UNIX_EPOCH)
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}

/// Parse a duration like "30s", "15m", "24h", "7d" or "1h30m".
/// A bare number is seconds.
fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u64>() {
        if n == 0 {
            bail!("duration must be > 0");
        }
        return Ok(Duration::from_secs(n));
    }

    let mut total: u64 = 0;
    let mut current = String::new();
    for ch in s.chars() {
        if ch.is_ascii_digit() {
            current.push(ch);
            continue;
        }
        let val: u64 = current
            .parse()
            .map_err(|_| anyhow!("invalid duration: {s}"))?;
        current.clear();
        let unit = match ch {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            _ => bail!("unknown duration unit '{ch}' in '{s}'"),
        };
        total = val
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| anyhow!("duration '{s}' is too large"))?;
    }

    if !current.is_empty() {
        bail!("duration '{s}' is missing a unit (s/m/h/d)");
    }
    if total == 0 {
        bail!("duration must be > 0");
    }
    Ok(Duration::from_secs(total))
}

/// Shortened token id for listings; the full id is a secret.
fn short_token(id: &str) -> String {
    let prefix: String = id.chars().take(10).collect();
    format!("{prefix}...")
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// AgenticToolgate CLI: operate the policy gateway between AI agents and
/// their tools.
#[derive(Parser, Debug)]
#[command(
    name = "tgate",
    about = "AgenticToolgate CLI",
    version,
    long_about = "tgate: AgenticToolgate CLI\n\nCheck allowlist policy, issue confirmation tokens, decide approval\nrequests, and inspect the audit trail of the tool gateway."
)]
struct Cli {
    /// State directory (default: ~/.agentic/toolgate)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect the allowlist policy
    Policy {
        #[command(subcommand)]
        subcommand: PolicyCommands,
    },

    /// Test path containment against allowlisted roots
    Path {
        #[command(subcommand)]
        subcommand: PathCommands,
    },

    /// Manage one-time confirmation tokens
    Token {
        #[command(subcommand)]
        subcommand: TokenCommands,
    },

    /// Manage approval requests
    Approval {
        #[command(subcommand)]
        subcommand: ApprovalCommands,
    },

    /// Inspect the audit trail
    Audit {
        #[command(subcommand)]
        subcommand: AuditCommands,
    },
}

#[derive(Subcommand, Debug)]
enum PolicyCommands {
    /// Load the config file and print the policy
    Check {
        /// Config file (default: <dir>/config.json)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PathCommands {
    /// Resolve a path and check it lies under one of the roots
    Check {
        /// Allowlisted root (repeatable, must be absolute)
        #[arg(long = "root", required = true)]
        roots: Vec<PathBuf>,

        /// Path to check; relative paths resolve under the first root
        candidate: String,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommands {
    /// Issue a token for one operation on one target
    Issue {
        /// Tool name the token authorizes
        #[arg(long)]
        operation: String,

        /// Resource the token authorizes (e.g. a table name)
        #[arg(long)]
        target: String,

        /// Lifetime (e.g. 15m, 1h; default from config)
        #[arg(long)]
        ttl: Option<String>,
    },
    /// List tokens
    List,
    /// Remove expired tokens
    Sweep,
}

#[derive(Subcommand, Debug)]
enum ApprovalCommands {
    /// Open a pending approval request
    Request {
        #[arg(long)]
        operation: String,

        #[arg(long)]
        target: String,
    },
    /// Approve a pending request
    Approve {
        /// Approval ID (aapr_...)
        id: String,

        /// Name of the approver
        #[arg(long)]
        by: Option<String>,
    },
    /// Reject a pending request
    Reject {
        /// Approval ID (aapr_...)
        id: String,

        #[arg(long)]
        by: Option<String>,

        /// Reason for the rejection
        #[arg(long)]
        note: Option<String>,
    },
    /// List approval requests
    List {
        /// Only show requests in this state (pending, approved, rejected, consumed)
        #[arg(long)]
        state: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AuditCommands {
    /// Print audit entries
    Show {
        /// Audit log (default: <dir>/audit.jsonl)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Only entries for this tool
        #[arg(long)]
        tool: Option<String>,

        /// Only the last N entries
        #[arg(long)]
        limit: Option<usize>,

        /// Print full entries as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Verify the audit hash chain
    Verify {
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

// ── Main entry point ──────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = state_dir(cli.dir.as_deref()).and_then(|dir| match cli.command {
        Commands::Policy { subcommand } => match subcommand {
            PolicyCommands::Check { config, json } => cmd_policy_check(&dir, config, json),
        },
        Commands::Path { subcommand } => match subcommand {
            PathCommands::Check { roots, candidate } => cmd_path_check(roots, &candidate),
        },
        Commands::Token { subcommand } => match subcommand {
            TokenCommands::Issue {
                operation,
                target,
                ttl,
            } => cmd_token_issue(&dir, &operation, &target, ttl.as_deref(), verbose),
            TokenCommands::List => cmd_token_list(&dir),
            TokenCommands::Sweep => cmd_token_sweep(&dir),
        },
        Commands::Approval { subcommand } => match subcommand {
            ApprovalCommands::Request { operation, target } => {
                cmd_approval_request(&dir, &operation, &target)
            }
            ApprovalCommands::Approve { id, by } => cmd_approval_approve(&dir, &id, by.as_deref()),
            ApprovalCommands::Reject { id, by, note } => {
                cmd_approval_reject(&dir, &id, by.as_deref(), note.as_deref())
            }
            ApprovalCommands::List { state } => cmd_approval_list(&dir, state.as_deref()),
        },
        Commands::Audit { subcommand } => match subcommand {
            AuditCommands::Show {
                file,
                tool,
                limit,
                json,
            } => cmd_audit_show(&dir, file, tool.as_deref(), limit, json),
            AuditCommands::Verify { file } => cmd_audit_verify(&dir, file),
        },
    });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

// ── Command implementations ───────────────────────────────────────────────────

#[derive(Serialize)]
struct PolicySummary<'a> {
    config: String,
    gateway: &'a GatewayConfig,
    policy: &'a AllowlistPolicy,
}

/// `tgate policy check [--config PATH] [--json]`
fn cmd_policy_check(dir: &Path, config: Option<PathBuf>, json: bool) -> Result<()> {
    let path = config.unwrap_or_else(|| dir.join(CONFIG_FILE));
    let loaded = ToolgateConfig::load(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    if json {
        let summary = PolicySummary {
            config: path.display().to_string(),
            gateway: &loaded.gateway,
            policy: &loaded.policy,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let gateway = &loaded.gateway;
    let policy = &loaded.policy;
    println!("Policy OK: {}", path.display());
    println!("  Idempotency TTL: {}s", gateway.idempotency_ttl_secs);
    println!("  In-flight wait:  {}ms", gateway.in_flight_wait_ms);
    println!("  Token TTL:       {}s", gateway.token_ttl_secs);
    println!("  Tables ({}):", policy.tables.len());
    for (table, columns) in &policy.tables {
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        println!("    - {table} [{}]", columns.join(", "));
    }
    println!("  Roots ({}):", policy.roots.len());
    for root in &policy.roots {
        println!("    - {}", root.display());
    }
    println!("  Environments ({}):", policy.environments.len());
    for env in &policy.environments {
        println!("    - {env}");
    }
    Ok(())
}

/// `tgate path check --root R... CANDIDATE`
fn cmd_path_check(roots: Vec<PathBuf>, candidate: &str) -> Result<()> {
    let policy = roots
        .into_iter()
        .fold(AllowlistPolicy::new(), |policy, root| policy.root(root))
        .canonicalize()?;

    match resolve_under_roots(candidate, &policy.roots) {
        Ok(resolved) => {
            println!("allowed: {}", resolved.display());
            Ok(())
        }
        Err(reason) => Err(anyhow!("rejected: {reason}")),
    }
}

/// `tgate token issue --operation OP --target T [--ttl 15m]`
fn cmd_token_issue(
    dir: &Path,
    operation: &str,
    target: &str,
    ttl: Option<&str>,
    verbose: bool,
) -> Result<()> {
    let ttl = match ttl {
        Some(s) => parse_duration(s)?,
        None => gateway_config(dir)?.token_ttl(),
    };

    let ledger = open_ledger(dir)?;
    let token = ledger.issue(operation, target, ttl)?;

    println!("Issued confirmation token");
    println!("  Token:     {}", token.id);
    println!("  Operation: {}", token.operation);
    println!("  Target:    {}", token.target);
    println!("  Expires:   {}", micros_to_datetime(token.expires_at));
    if let (true, Some(path)) = (verbose, ledger.backing_file()) {
        println!("  Ledger:    {}", path.display());
    }
    Ok(())
}

fn token_status(token: &ConfirmationToken, now: u64) -> &'static str {
    if token.consumed {
        "consumed"
    } else if token.is_expired(now) {
        "expired"
    } else {
        "active"
    }
}

/// `tgate token list`
fn cmd_token_list(dir: &Path) -> Result<()> {
    let snapshot = open_ledger(dir)?.snapshot()?;
    if snapshot.tokens.is_empty() {
        println!("No confirmation tokens");
        return Ok(());
    }

    let now = now_micros();
    println!(
        "{:<14} {:<20} {:<20} {:<24} STATUS",
        "TOKEN", "OPERATION", "TARGET", "EXPIRES"
    );
    println!("{}", "-".repeat(88));
    for token in &snapshot.tokens {
        println!(
            "{:<14} {:<20} {:<20} {:<24} {}",
            short_token(&token.id),
            token.operation,
            token.target,
            micros_to_datetime(token.expires_at),
            token_status(token, now)
        );
    }
    Ok(())
}

/// `tgate token sweep`
fn cmd_token_sweep(dir: &Path) -> Result<()> {
    let removed = open_ledger(dir)?.sweep_expired(now_micros())?;
    println!("Removed {removed} expired token(s)");
    Ok(())
}

/// `tgate approval request --operation OP --target T`
fn cmd_approval_request(dir: &Path, operation: &str, target: &str) -> Result<()> {
    let request = open_ledger(dir)?.create_approval(operation, target)?;

    println!("Approval requested");
    println!("  ID:        {}", request.id);
    println!("  Operation: {}", request.operation);
    println!("  Target:    {}", request.target);
    Ok(())
}

/// `tgate approval approve ID [--by NAME]`
fn cmd_approval_approve(dir: &Path, id: &str, by: Option<&str>) -> Result<()> {
    let request = open_ledger(dir)?.approve(id, by)?;
    println!(
        "Approved {} ({} on {})",
        request.id, request.operation, request.target
    );
    Ok(())
}

/// `tgate approval reject ID [--by NAME] [--note TEXT]`
fn cmd_approval_reject(dir: &Path, id: &str, by: Option<&str>, note: Option<&str>) -> Result<()> {
    let request = open_ledger(dir)?.reject(id, by, note)?;
    println!(
        "Rejected {} ({} on {})",
        request.id, request.operation, request.target
    );
    Ok(())
}

/// `tgate approval list [--state S]`
fn cmd_approval_list(dir: &Path, state: Option<&str>) -> Result<()> {
    let filter = match state {
        Some(s) => Some(ApprovalState::parse(s).ok_or_else(|| {
            anyhow!("unknown approval state '{s}' (pending, approved, rejected, consumed)")
        })?),
        None => None,
    };

    let snapshot = open_ledger(dir)?.snapshot()?;
    let requests: Vec<_> = snapshot
        .approvals
        .iter()
        .filter(|r| filter.map_or(true, |f| r.state == f))
        .collect();
    if requests.is_empty() {
        println!("No approval requests");
        return Ok(());
    }

    println!(
        "{:<28} {:<20} {:<20} {:<10} DECIDED BY",
        "ID", "OPERATION", "TARGET", "STATE"
    );
    println!("{}", "-".repeat(92));
    for r in requests {
        println!(
            "{:<28} {:<20} {:<20} {:<10} {}",
            r.id,
            r.operation,
            r.target,
            r.state.as_str(),
            r.decided_by.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn read_audit(dir: &Path, file: Option<PathBuf>) -> Result<(PathBuf, Vec<AuditEntry>)> {
    let path = file.unwrap_or_else(|| dir.join(AUDIT_FILE));
    let entries = JsonlAuditSink::read_all(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok((path, entries))
}

/// `tgate audit show [--file PATH] [--tool NAME] [--limit N] [--json]`
fn cmd_audit_show(
    dir: &Path,
    file: Option<PathBuf>,
    tool: Option<&str>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let (path, entries) = read_audit(dir, file)?;
    let mut selected: Vec<&AuditEntry> = entries
        .iter()
        .filter(|e| tool.map_or(true, |t| e.tool_name == t))
        .collect();
    if let Some(limit) = limit {
        let skip = selected.len().saturating_sub(limit);
        selected.drain(..skip);
    }

    if selected.is_empty() {
        println!("No audit entries in {}", path.display());
        return Ok(());
    }

    if json {
        for entry in selected {
            println!("{}", serde_json::to_string(entry)?);
        }
        return Ok(());
    }

    println!(
        "{:<6} {:<24} {:<20} {:<16} {:<20} ERROR",
        "SEQ", "TIME", "TOOL", "CALLER", "STATE"
    );
    println!("{}", "-".repeat(100));
    for e in selected {
        println!(
            "{:<6} {:<24} {:<20} {:<16} {:<20} {}",
            e.sequence,
            micros_to_datetime(e.timestamp),
            e.tool_name,
            e.caller_id,
            e.terminal_state.as_str(),
            e.error_type.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// `tgate audit verify [--file PATH]`
fn cmd_audit_verify(dir: &Path, file: Option<PathBuf>) -> Result<()> {
    let (path, entries) = read_audit(dir, file)?;
    verify_audit_chain(&entries).with_context(|| format!("{} failed verification", path.display()))?;
    match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => println!(
            "Audit chain valid: {} entries (#{} to #{})",
            entries.len(),
            first.sequence,
            last.sequence
        ),
        _ => println!("Audit chain valid: no entries"),
    }
    Ok(())
}
