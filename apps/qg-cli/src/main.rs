//! # qg-cli
//!
//! Command-line interface for Quorum Gate.
//!
//! - `qg policy show/validate`: inspect and lint rule tables
//! - `qg check`: ask whether an actor may perform an action
//! - `qg quorum request/vote/evidence/status/pending/clear`: drive approvals
//! - `qg audit verify/tail`: inspect the tamper-evident audit trail

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use qg_gate::GateConfig;
use tracing_subscriber::EnvFilter;

/// Quorum Gate CLI: policy checks and multi-party approval.
#[derive(Parser)]
#[command(name = "qg", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and validate rule tables.
    Policy {
        #[command(subcommand)]
        command: commands::policy::PolicyCommands,
    },
    /// Check whether an actor may perform an action.
    Check(commands::check::CheckArgs),
    /// Request, vote on and inspect quorum decisions.
    Quorum {
        #[command(subcommand)]
        command: commands::quorum::QuorumCommands,
    },
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = GateConfig::load_or_default(&project_root);

    match &cli.command {
        Commands::Policy { command } => commands::policy::execute(command, &config),
        Commands::Check(args) => commands::check::execute(args, &config),
        Commands::Quorum { command } => commands::quorum::execute(command, &config),
        Commands::Audit { command } => commands::audit::execute(command, &config),
    }
}

const DEFAULT_LOG: &str = "qg=info,qg_quorum=info,qg_policy=warn";

/// `RUST_LOG` when it is set and parses, otherwise the default directives.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn rust_log_replaces_default_directives() {
        let filter = log_filter(Some("qg_quorum=debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn defaults_apply_when_rust_log_is_unset_or_blank() {
        for rust_log in [None, Some(""), Some("  ")] {
            assert_eq!(log_filter(rust_log).max_level_hint(), Some(LevelFilter::INFO));
        }
    }
}
