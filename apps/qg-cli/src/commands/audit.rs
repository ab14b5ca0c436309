// audit.rs — Audit subcommands: verify, tail.

use std::path::PathBuf;

use clap::Subcommand;
use qg_audit::{AuditError, AuditLog};
use qg_gate::GateConfig;

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Verify the audit log hash chain integrity.
    Verify {
        /// Path to audit log (defaults to .qg/audit.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Show recent audit events.
    Tail {
        /// Path to audit log (defaults to .qg/audit.jsonl).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Number of events to show.
        #[arg(short, default_value = "10")]
        n: usize,
        /// Only events for this policy id.
        #[arg(long)]
        policy: Option<String>,
    },
}

pub fn execute(cmd: &AuditCommands, config: &GateConfig) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Verify { log } => {
            let Some(path) = log.clone().or_else(|| config.audit_log.clone()) else {
                println!("Auditing is disabled in .qg/config.toml");
                return Ok(());
            };
            if !path.exists() {
                println!("No audit log found at {}", path.display());
                return Ok(());
            }

            match AuditLog::verify_chain(&path) {
                Ok(count) => {
                    println!("Audit log verified: {} event(s), hash chain intact.", count);
                }
                Err(AuditError::IntegrityViolation {
                    line,
                    expected,
                    actual,
                }) => {
                    println!("INTEGRITY VIOLATION at line {}:", line);
                    println!("  Expected previous_hash: {}", expected);
                    println!("  Actual previous_hash:   {}", actual);
                    println!();
                    println!("The audit log may have been tampered with.");
                    anyhow::bail!("Audit log integrity check failed");
                }
                Err(e) => return Err(e.into()),
            }
        }

        AuditCommands::Tail { log, n, policy } => {
            let Some(path) = log.clone().or_else(|| config.audit_log.clone()) else {
                println!("Auditing is disabled in .qg/config.toml");
                return Ok(());
            };
            if !path.exists() {
                println!("No audit log found at {}", path.display());
                return Ok(());
            }

            let events = match policy {
                Some(id) => AuditLog::events_for(&path, id)?,
                None => AuditLog::read_all(&path)?,
            };
            let start = events.len().saturating_sub(*n);
            let recent = &events[start..];

            if recent.is_empty() {
                println!("No audit events.");
                return Ok(());
            }

            println!(
                "{:<20} {:<16} {:<18} POLICY",
                "TIMESTAMP", "ACTOR", "ACTION"
            );
            println!("{}", "-".repeat(80));

            for event in recent {
                println!(
                    "{:<20} {:<16} {:<18} {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.actor_id,
                    event.action.to_string(),
                    event.policy_id.as_deref().unwrap_or("-"),
                );
            }
        }
    }

    Ok(())
}
