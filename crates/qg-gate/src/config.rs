// config.rs — Gate configuration.
//
// GateConfig determines where the gate finds its rule table and where it
// keeps state: in-flight quorum decisions and the audit log. The
// `for_project()` constructor generates defaults under a `.qg/` directory in
// the project root; `.qg/config.toml` may override any of them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Configuration for a [`PolicyEnforcer`](crate::PolicyEnforcer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Rule table source. `None` always serves the built-in fallback table.
    pub policy_table: Option<PathBuf>,

    /// How long a loaded table is served from cache.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Directory for decision files (one JSON file per policy id).
    pub decisions_dir: PathBuf,

    /// Path to the append-only audit log. `None` disables auditing.
    pub audit_log: Option<PathBuf>,

    /// Whether the requester's own approval is recorded when a quorum is requested.
    #[serde(default = "default_true")]
    pub requester_counts_toward_quorum: bool,

    /// Keep decisions on disk. When false, decisions live only in memory.
    #[serde(default = "default_true")]
    pub persist_decisions: bool,
}

/// Overrides read from `.qg/config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    policy_table: Option<PathBuf>,
    cache_ttl_secs: Option<u64>,
    decisions_dir: Option<PathBuf>,
    audit_log: Option<PathBuf>,
    requester_counts_toward_quorum: Option<bool>,
    persist_decisions: Option<bool>,
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl GateConfig {
    /// Create a config with the standard `.qg/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let qg_dir = project_root.as_ref().join(".qg");
        Self {
            policy_table: Some(qg_dir.join("policy-table.yaml")),
            cache_ttl_secs: default_cache_ttl_secs(),
            decisions_dir: qg_dir.join("decisions"),
            audit_log: Some(qg_dir.join("audit.jsonl")),
            requester_counts_toward_quorum: true,
            persist_decisions: true,
        }
    }

    /// Path of the config file for a project root.
    pub fn config_path(project_root: impl AsRef<Path>) -> PathBuf {
        project_root.as_ref().join(".qg").join("config.toml")
    }

    /// Load `.qg/config.toml` over the project defaults. Relative paths in
    /// the file resolve against the project root. A missing file yields the
    /// defaults.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, GateError> {
        let root = project_root.as_ref();
        let path = Self::config_path(root);
        let mut config = Self::for_project(root);
        if !path.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| GateError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| GateError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let resolve = |p: PathBuf| if p.is_absolute() { p } else { root.join(p) };
        if let Some(table) = file.policy_table {
            config.policy_table = Some(resolve(table));
        }
        if let Some(ttl) = file.cache_ttl_secs {
            config.cache_ttl_secs = ttl;
        }
        if let Some(dir) = file.decisions_dir {
            config.decisions_dir = resolve(dir);
        }
        if let Some(log) = file.audit_log {
            config.audit_log = Some(resolve(log));
        }
        if let Some(counts) = file.requester_counts_toward_quorum {
            config.requester_counts_toward_quorum = counts;
        }
        if let Some(persist) = file.persist_decisions {
            config.persist_decisions = persist;
        }
        Ok(config)
    }

    /// Like [`load`](Self::load), but an unreadable file logs a warning and
    /// yields the defaults.
    pub fn load_or_default(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref();
        Self::load(root).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default gate config");
            Self::for_project(root)
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
