// store.rs — Where quorum decisions live.
//
// `MemoryQuorumStore` keeps decisions for the life of the process.
// `JsonQuorumStore` writes one JSON file per decision
// (`<dir>/<policy_id>.json`) so in-flight approvals for irreversible
// actions survive a restart. Writes go to a temp file first and are renamed
// into place, so a crash never leaves a half-written decision.
//
// Several processes (e.g. concurrent `qg quorum vote` runs) may share one
// decisions directory. `lock_key` takes an exclusive advisory lock on
// `<dir>/<policy_id>.lock` so a read-modify-write in one process cannot
// interleave with one in another. Lock files are never removed.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::error::QuorumError;
use crate::vote::QuorumDecision;

/// Storage for quorum decisions, keyed by policy id.
///
/// Implementations must be safe to share between threads. The engine
/// serializes writes per key within a process; a store shared between
/// processes also serializes them through `lock_key`.
pub trait QuorumStore: Send + Sync {
    /// Hold `policy_id` exclusively against other processes until the guard
    /// is dropped. Process-local stores have nothing to lock.
    fn lock_key(&self, _policy_id: &str) -> Result<KeyGuard, QuorumError> {
        Ok(KeyGuard::default())
    }

    fn get(&self, policy_id: &str) -> Result<Option<QuorumDecision>, QuorumError>;

    /// Insert or overwrite a decision.
    fn put(&self, decision: &QuorumDecision) -> Result<(), QuorumError>;

    /// Remove a decision. Returns whether one existed.
    fn remove(&self, policy_id: &str) -> Result<bool, QuorumError>;

    /// All decisions, oldest first.
    fn list(&self) -> Result<Vec<QuorumDecision>, QuorumError>;

    /// Remove every decision.
    fn clear(&self) -> Result<(), QuorumError>;
}

/// A held store lock. Dropping it closes the lock file, which releases the lock.
#[derive(Debug, Default)]
pub struct KeyGuard {
    _file: Option<File>,
}

/// Process-local decision store.
#[derive(Default)]
pub struct MemoryQuorumStore {
    decisions: RwLock<HashMap<String, QuorumDecision>>,
}

impl MemoryQuorumStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(e: impl std::fmt::Display) -> QuorumError {
    QuorumError::LockPoisoned(e.to_string())
}

impl QuorumStore for MemoryQuorumStore {
    fn get(&self, policy_id: &str) -> Result<Option<QuorumDecision>, QuorumError> {
        let decisions = self.decisions.read().map_err(poisoned)?;
        Ok(decisions.get(policy_id).cloned())
    }

    fn put(&self, decision: &QuorumDecision) -> Result<(), QuorumError> {
        let mut decisions = self.decisions.write().map_err(poisoned)?;
        decisions.insert(decision.policy_id.clone(), decision.clone());
        Ok(())
    }

    fn remove(&self, policy_id: &str) -> Result<bool, QuorumError> {
        let mut decisions = self.decisions.write().map_err(poisoned)?;
        Ok(decisions.remove(policy_id).is_some())
    }

    fn list(&self) -> Result<Vec<QuorumDecision>, QuorumError> {
        let decisions = self.decisions.read().map_err(poisoned)?;
        let mut all: Vec<QuorumDecision> = decisions.values().cloned().collect();
        all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(all)
    }

    fn clear(&self) -> Result<(), QuorumError> {
        self.decisions.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

/// Durable decision store: one JSON file per decision.
pub struct JsonQuorumStore {
    store_dir: PathBuf,
}

impl JsonQuorumStore {
    /// Open a store in the given directory, creating it if needed.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, QuorumError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| io_error(&store_dir, source))?;
        Ok(Self { store_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.store_dir
    }

    fn decision_file(&self, policy_id: &str) -> Result<PathBuf, QuorumError> {
        validate_key(policy_id)?;
        Ok(self.store_dir.join(format!("{}.json", policy_id)))
    }

    /// A temp path no other writer in any process is using.
    fn temp_file(&self, policy_id: &str) -> PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        self.store_dir
            .join(format!("{}.json.{}-{}.tmp", policy_id, std::process::id(), seq))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> QuorumError {
    QuorumError::Store {
        path: path.display().to_string(),
        source,
    }
}

/// Decision keys become file names, so only a safe alphabet is accepted.
pub(crate) fn validate_key(policy_id: &str) -> Result<(), QuorumError> {
    let valid = !policy_id.is_empty()
        && policy_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(QuorumError::InvalidPolicyId {
            policy_id: policy_id.to_string(),
        })
    }
}

impl QuorumStore for JsonQuorumStore {
    fn lock_key(&self, policy_id: &str) -> Result<KeyGuard, QuorumError> {
        validate_key(policy_id)?;
        let path = self.store_dir.join(format!("{}.lock", policy_id));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| io_error(&path, source))?;
        file.lock().map_err(|source| io_error(&path, source))?;
        Ok(KeyGuard { _file: Some(file) })
    }

    fn get(&self, policy_id: &str) -> Result<Option<QuorumDecision>, QuorumError> {
        let path = self.decision_file(policy_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn put(&self, decision: &QuorumDecision) -> Result<(), QuorumError> {
        let path = self.decision_file(&decision.policy_id)?;
        let tmp = self.temp_file(&decision.policy_id);
        let json = serde_json::to_string_pretty(decision)?;
        fs::write(&tmp, json).map_err(|source| io_error(&tmp, source))?;
        if let Err(source) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(&path, source));
        }
        Ok(())
    }

    fn remove(&self, policy_id: &str) -> Result<bool, QuorumError> {
        let path = self.decision_file(policy_id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|source| io_error(&path, source))?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<QuorumDecision>, QuorumError> {
        let entries =
            fs::read_dir(&self.store_dir).map_err(|source| io_error(&self.store_dir, source))?;

        let mut decisions = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| io_error(&self.store_dir, source))?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
                match serde_json::from_str::<QuorumDecision>(&json) {
                    Ok(decision) => decisions.push(decision),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable decision file")
                    }
                }
            }
        }

        decisions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(decisions)
    }

    fn clear(&self) -> Result<(), QuorumError> {
        for decision in self.list()? {
            self.remove(&decision.policy_id)?;
        }
        Ok(())
    }
}
