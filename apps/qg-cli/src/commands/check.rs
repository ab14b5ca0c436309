// check.rs — `qg check`: run a policy check and print the result as JSON.

use clap::Args;
use qg_gate::{GateConfig, PolicyEnforcer, Verdict};
use qg_policy::{Capability, Scope};

use super::ActorArgs;

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub actor: ActorArgs,
    /// Capability requested (e.g., deploy, modify_schema).
    #[arg(long)]
    pub capability: Capability,
    /// Scope of the request (e.g., dream, infrastructure).
    #[arg(long)]
    pub scope: Scope,
}

pub fn execute(args: &CheckArgs, config: &GateConfig) -> anyhow::Result<()> {
    let gate = PolicyEnforcer::from_config(config)?;
    let actor = args.actor.to_context();
    let result = gate.check_policy(&actor, args.capability, args.scope);

    println!("{}", serde_json::to_string_pretty(&result)?);
    match result.verdict() {
        Verdict::Allowed => {}
        Verdict::PendingQuorum { policy_id, quorum_types } => {
            let kinds: Vec<String> = quorum_types.iter().map(ToString::to_string).collect();
            eprintln!(
                "Quorum required ({}). Request approval with: qg quorum request --actor {} --actor-type {} --capability {} --scope {}",
                kinds.join(", "),
                actor.actor_id,
                actor.actor_type,
                args.capability,
                args.scope
            );
            tracing::debug!(policy_id = %policy_id, "check deferred to quorum");
        }
        Verdict::Denied { reason } => anyhow::bail!("Denied: {}", reason),
    }
    Ok(())
}
