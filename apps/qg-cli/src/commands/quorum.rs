// quorum.rs — Quorum subcommands: request, vote, evidence, status, pending, clear.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use qg_gate::{GateConfig, PolicyEnforcer};
use qg_policy::{policy_id, ActorContext, ActorType, Capability, Scope};
use qg_quorum::{QuorumDecision, QuorumEvidence, VoteDecision};

use super::ActorArgs;

#[derive(Subcommand)]
pub enum QuorumCommands {
    /// Open (or join) the approval round for an action.
    Request {
        #[command(flatten)]
        actor: ActorArgs,
        #[arg(long)]
        capability: Capability,
        #[arg(long)]
        scope: Scope,
    },
    /// Cast or replace a vote on a decision.
    Vote {
        /// Policy id (e.g., admin-deploy-infrastructure).
        policy_id: String,
        #[arg(long)]
        voter: String,
        #[arg(long)]
        voter_type: ActorType,
        /// approve, reject or abstain.
        #[arg(long)]
        decision: VoteDecision,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Submit quorum evidence (test results, stake or guard votes) from a JSON file.
    Evidence {
        policy_id: String,
        /// JSON file, e.g. {"kind":"safety","votes":[...],"requireUnanimous":true}.
        #[arg(long)]
        file: PathBuf,
    },
    /// Show a decision and its votes.
    Status { policy_id: String },
    /// List decisions still waiting for votes.
    Pending,
    /// Drop a decision so the action can go through a fresh round.
    Clear {
        policy_id: String,
        /// Who is clearing the decision (recorded in the audit log).
        #[arg(long, default_value = "cli")]
        by: String,
    },
}

pub fn execute(cmd: &QuorumCommands, config: &GateConfig) -> anyhow::Result<()> {
    let gate = PolicyEnforcer::from_config(config)?;

    match cmd {
        QuorumCommands::Request {
            actor,
            capability,
            scope,
        } => {
            let actor = actor.to_context();
            let id = policy_id(actor.actor_type, *capability, *scope);
            let status =
                gate.request_quorum_approval(&id, &actor, *capability, *scope, &[])?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        QuorumCommands::Vote {
            policy_id,
            voter,
            voter_type,
            decision,
            reason,
        } => {
            let voter = ActorContext::new(voter, *voter_type);
            let updated = gate.cast_vote(policy_id, &voter, *decision, reason.as_deref())?;
            print_decision(&updated);
        }

        QuorumCommands::Evidence { policy_id, file } => {
            let evidence = read_evidence(file)?;
            let updated = gate.submit_evidence(policy_id, &evidence)?;
            print_decision(&updated);
        }

        QuorumCommands::Status { policy_id } => match gate.get_decision(policy_id)? {
            Some(decision) => print_decision(&decision),
            None => println!("No decision for {}", policy_id),
        },

        QuorumCommands::Pending => {
            let pending = gate.pending()?;
            if pending.is_empty() {
                println!("No pending decisions.");
                return Ok(());
            }

            println!(
                "{:<40} {:<10} {:<10} OPENED",
                "POLICY", "KIND", "APPROVALS"
            );
            println!("{}", "-".repeat(80));
            for d in &pending {
                println!(
                    "{:<40} {:<10} {:<10} {}",
                    d.policy_id,
                    d.quorum_type.map(|k| k.to_string()).unwrap_or_else(|| "-".into()),
                    format!("{}/{}", d.approvals(), d.threshold),
                    d.timestamp.format("%Y-%m-%d %H:%M:%S"),
                );
            }
            println!("\n{} pending decision(s).", pending.len());
        }

        QuorumCommands::Clear { policy_id, by } => {
            if gate.clear_decision(policy_id, by)? {
                println!("Cleared decision for {}", policy_id);
            } else {
                println!("No decision for {}", policy_id);
            }
        }
    }

    Ok(())
}

fn read_evidence(path: &Path) -> anyhow::Result<QuorumEvidence> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read evidence file {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&content)?)
}

fn print_decision(d: &QuorumDecision) {
    println!("Policy:     {}", d.policy_id);
    if let Some(kind) = d.quorum_type {
        println!("Quorum:     {}", kind);
    }
    println!("Result:     {}", d.result);
    println!("Approvals:  {}/{}", d.approvals(), d.threshold);
    if let Some(by) = &d.requested_by {
        println!("Requested:  {}", by);
    }
    println!("Opened:     {}", d.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Updated:    {}", d.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));

    if d.votes.is_empty() {
        return;
    }
    println!("Votes:");
    for v in &d.votes {
        println!(
            "  {:<24} {:<8} {:<8} {}",
            v.voter,
            v.voter_type.to_string(),
            v.decision.to_string(),
            v.reason.as_deref().unwrap_or("")
        );
    }
}
