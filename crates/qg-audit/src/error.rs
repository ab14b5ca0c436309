// error.rs — Error types for the audit trail.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing or reading the audit trail.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit log file could not be opened or created.
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing an event (or reading a line back) failed.
    #[error("audit log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// An event could not be serialized, or a stored line is not valid JSON.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The hash chain is broken: an event was inserted, removed or edited.
    #[error("integrity check failed at line {line}: expected hash {expected}, got {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },
}
