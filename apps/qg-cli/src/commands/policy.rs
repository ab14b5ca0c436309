// policy.rs — Policy subcommands: show, validate.

use std::path::PathBuf;

use clap::Subcommand;
use qg_gate::GateConfig;
use qg_policy::{PolicyTable, PolicyTableLoader};

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Print the effective rule table (falls back to defaults when unreadable).
    Show {
        /// Rule table path (defaults to .qg/policy-table.yaml).
        #[arg(long)]
        table: Option<PathBuf>,
        /// Print JSON instead of YAML.
        #[arg(long)]
        json: bool,
    },
    /// Strictly validate a rule table; exits non-zero on any error.
    Validate {
        /// Rule table path.
        path: PathBuf,
    },
}

pub fn execute(cmd: &PolicyCommands, config: &GateConfig) -> anyhow::Result<()> {
    match cmd {
        PolicyCommands::Show { table, json } => {
            let path = table.clone().or_else(|| config.policy_table.clone());
            let loader = PolicyTableLoader::new(path.clone());
            let effective = loader.load();

            if effective.is_fallback() {
                match &path {
                    Some(p) => eprintln!(
                        "No usable rule table at {}; showing the built-in fallback table.",
                        p.display()
                    ),
                    None => eprintln!("No rule table configured; showing the built-in fallback table."),
                }
            }
            print_shadowed(&effective);

            if *json {
                println!("{}", serde_json::to_string_pretty(effective.as_ref())?);
            } else {
                print!("{}", serde_yaml::to_string(effective.as_ref())?);
            }
        }

        PolicyCommands::Validate { path } => {
            let table = PolicyTableLoader::read_table(path)?;
            print_shadowed(&table);
            println!(
                "{}: valid (version {}, {} rule(s))",
                path.display(),
                table.version,
                table.rules.len()
            );
        }
    }

    Ok(())
}

fn print_shadowed(table: &PolicyTable) {
    for shadow in table.shadowed_rules() {
        let rule = &table.rules[shadow.index];
        eprintln!(
            "warning: rule {} ({} {} {}) is shadowed by rule {} and can never match",
            shadow.index, rule.actor, rule.capability, rule.scope, shadow.shadowed_by
        );
    }
}
