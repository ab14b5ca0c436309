// log.rs — Append-only JSONL audit trail.
//
// Each line is one AuditEvent. `previous_hash` on line N is the SHA-256 of
// the raw text of line N-1, so the chain is checked against exactly what was
// written, independent of serde field ordering.
//
// Several processes may append to one log. Each append holds an exclusive
// lock on the file, and re-reads the chain head when the file has grown
// since this handle last wrote.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::hasher;

/// An append-only audit log backed by a JSONL file.
pub struct AuditLog {
    file: File,
    path: PathBuf,
    last_hash: Option<String>,
    /// File length when `last_hash` was taken.
    synced_len: u64,
}

impl AuditLog {
    /// Open (or create) the log, recovering the chain head from existing content.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        let mut log = Self {
            file,
            path,
            last_hash: None,
            synced_len: 0,
        };
        log.file.lock()?;
        let synced = log.sync_head();
        log.file.unlock()?;
        synced?;
        Ok(log)
    }

    /// Append an event, linking it to the previous one, and flush.
    pub fn append(&mut self, event: &mut AuditEvent) -> Result<(), AuditError> {
        self.file.lock()?;
        let result = self.append_locked(event);
        let unlocked = self.file.unlock();
        result?;
        unlocked?;
        tracing::debug!(action = %event.action, actor = %event.actor_id, "audit event appended");
        Ok(())
    }

    fn append_locked(&mut self, event: &mut AuditEvent) -> Result<(), AuditError> {
        if self.file.metadata()?.len() != self.synced_len {
            self.sync_head()?;
        }
        event.previous_hash = self.last_hash.clone();
        let json = serde_json::to_string(event)?;
        // One write per line keeps appends from other handles whole.
        self.file.write_all(format!("{}\n", json).as_bytes())?;
        self.file.flush()?;
        self.last_hash = Some(hasher::hash_str(&json));
        self.synced_len = self.file.metadata()?.len();
        Ok(())
    }

    /// Take the chain head from the file as it is now.
    fn sync_head(&mut self) -> Result<(), AuditError> {
        (&self.file).seek(SeekFrom::Start(0))?;
        self.last_hash = lines_of(&self.file)?
            .last()
            .map(|line| hasher::hash_str(line));
        self.synced_len = self.file.metadata()?.len();
        Ok(())
    }

    /// Read every event, oldest first.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>, AuditError> {
        read_lines(path.as_ref())?
            .iter()
            .map(|line| serde_json::from_str(line).map_err(AuditError::from))
            .collect()
    }

    /// Read the events that concern one policy id, oldest first.
    pub fn events_for(
        path: impl AsRef<Path>,
        policy_id: &str,
    ) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(Self::read_all(path)?
            .into_iter()
            .filter(|e| e.policy_id.as_deref() == Some(policy_id))
            .collect())
    }

    /// Verify the hash chain. Returns the number of events checked.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let mut previous_hash: Option<String> = None;
        let lines = read_lines(path.as_ref())?;

        for (i, line) in lines.iter().enumerate() {
            let event: AuditEvent = serde_json::from_str(line)?;
            if event.previous_hash != previous_hash {
                return Err(AuditError::IntegrityViolation {
                    line: i + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: event.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            previous_hash = Some(hasher::hash_str(line));
        }

        Ok(lines.len())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Non-blank lines of the log file.
fn read_lines(path: &Path) -> Result<Vec<String>, AuditError> {
    let file = File::open(path).map_err(|source| AuditError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    lines_of(file)
}

fn lines_of(reader: impl Read) -> Result<Vec<String>, AuditError> {
    let mut lines = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditAction;
    use tempfile::tempdir;

    fn vote_event(voter: &str, policy_id: &str) -> AuditEvent {
        AuditEvent::new(voter, AuditAction::VoteCast).with_policy_id(policy_id)
    }

    #[test]
    fn append_and_read_back_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let mut log = AuditLog::open(&path).unwrap();
            log.append(&mut AuditEvent::new("admin-1", AuditAction::QuorumRequested))
                .unwrap();
            log.append(&mut vote_event("admin-2", "admin-deploy-infrastructure"))
                .unwrap();
        }

        let events = AuditLog::read_all(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::QuorumRequested);
        assert!(events[0].previous_hash.is_none());
        assert_eq!(events[1].action, AuditAction::VoteCast);
        assert!(events[1].previous_hash.is_some());
    }

    #[test]
    fn chain_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");

        {
            let mut log = AuditLog::open(&path).unwrap();
            log.append(&mut vote_event("g1", "p")).unwrap();
        }
        {
            let mut log = AuditLog::open(&path).unwrap();
            log.append(&mut vote_event("g2", "p")).unwrap();
            log.append(&mut vote_event("g3", "p")).unwrap();
        }

        assert_eq!(AuditLog::verify_chain(&path).unwrap(), 3);
    }

    #[test]
    fn handles_opened_side_by_side_keep_one_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let mut first = AuditLog::open(&path).unwrap();
        let mut second = AuditLog::open(&path).unwrap();
        first.append(&mut vote_event("a1", "p")).unwrap();
        second.append(&mut vote_event("a2", "p")).unwrap();
        first.append(&mut vote_event("a3", "p")).unwrap();
        second.append(&mut vote_event("a4", "p")).unwrap();

        assert_eq!(AuditLog::verify_chain(&path).unwrap(), 4);
        let voters: Vec<String> = AuditLog::read_all(&path)
            .unwrap()
            .into_iter()
            .map(|e| e.actor_id)
            .collect();
        assert_eq!(voters, vec!["a1", "a2", "a3", "a4"]);
    }

    #[test]
    fn removing_a_vote_breaks_the_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let mut log = AuditLog::open(&path).unwrap();
            for voter in ["a1", "a2", "a3"] {
                log.append(&mut vote_event(voter, "admin-payout-token"))
                    .unwrap();
            }
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let kept: Vec<&str> = content
            .lines()
            .enumerate()
            .filter(|(i, _)| *i != 1)
            .map(|(_, l)| l)
            .collect();
        std::fs::write(&path, kept.join("\n")).unwrap();

        match AuditLog::verify_chain(&path) {
            Err(AuditError::IntegrityViolation { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected IntegrityViolation, got {:?}", other),
        }
    }

    #[test]
    fn events_for_filters_by_policy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let mut log = AuditLog::open(&path).unwrap();
            log.append(&mut vote_event("a", "admin-deploy-infrastructure"))
                .unwrap();
            log.append(&mut vote_event("b", "admin-payout-token")).unwrap();
            log.append(&mut vote_event("c", "admin-deploy-infrastructure"))
                .unwrap();
        }

        let events = AuditLog::events_for(&path, "admin-deploy-infrastructure").unwrap();
        let voters: Vec<&str> = events.iter().map(|e| e.actor_id.as_str()).collect();
        assert_eq!(voters, vec!["a", "c"]);
    }
}
