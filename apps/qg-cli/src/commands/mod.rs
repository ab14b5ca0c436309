pub mod audit;
pub mod check;
pub mod policy;
pub mod quorum;

use clap::Args;
use qg_policy::{ActorContext, ActorType};

/// Flags describing the acting identity.
#[derive(Args, Debug, Clone)]
pub struct ActorArgs {
    /// Actor id.
    #[arg(long)]
    pub actor: String,
    /// Actor type: agent, wallet, system, admin.
    #[arg(long)]
    pub actor_type: ActorType,
    #[arg(long)]
    pub trust_score: Option<f64>,
    #[arg(long)]
    pub staked_tokens: Option<f64>,
    #[arg(long)]
    pub completed_dreams: Option<u64>,
    /// Badge held by the actor (repeatable).
    #[arg(long = "badge")]
    pub badges: Vec<String>,
}

impl ActorArgs {
    pub fn to_context(&self) -> ActorContext {
        let mut actor = ActorContext::new(&self.actor, self.actor_type);
        actor.trust_score = self.trust_score;
        actor.staked_tokens = self.staked_tokens;
        actor.completed_dreams = self.completed_dreams;
        for badge in &self.badges {
            actor = actor.with_badge(badge);
        }
        actor
    }
}
