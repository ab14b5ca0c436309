// loader.rs — Cached, fail-safe loading of the rule table.
//
// `load()` never fails. A missing, unreadable or invalid source logs a
// warning and yields the built-in fallback table. Successful reads are
// cached for a fixed TTL; the fallback is never cached, so a fixed source
// is picked up on the next call.
//
// The cache mutex is held across the read, so concurrent callers that miss
// the cache wait for one reload instead of each re-reading the source.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::PolicyError;
use crate::table::{PolicyTable, TableFormat};

/// How long a successfully loaded table is served from cache.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

struct CachedTable {
    path: PathBuf,
    table: Arc<PolicyTable>,
    loaded_at: Instant,
}

/// Loads the policy table from an optional source file, with caching.
pub struct PolicyTableLoader {
    path: Option<PathBuf>,
    ttl: Duration,
    fallback: Arc<PolicyTable>,
    cache: Mutex<Option<CachedTable>>,
}

impl PolicyTableLoader {
    /// A loader for the given source. `None` always serves the fallback table.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            ttl: DEFAULT_CACHE_TTL,
            fallback: Arc::new(PolicyTable::fallback()),
            cache: Mutex::new(None),
        }
    }

    /// A loader that only ever serves a fixed, in-memory table.
    ///
    /// Used by embedders that author rules in code, and by tests.
    pub fn fixed(table: PolicyTable) -> Self {
        Self {
            path: None,
            ttl: DEFAULT_CACHE_TTL,
            fallback: Arc::new(table),
            cache: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The effective table for the configured source.
    pub fn load(&self) -> Arc<PolicyTable> {
        self.load_from(self.path.as_deref())
    }

    /// The effective table for an explicit source location.
    pub fn load_from(&self, path: Option<&Path>) -> Arc<PolicyTable> {
        let Some(path) = path else {
            return Arc::clone(&self.fallback);
        };

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.as_ref() {
            if cached.path == path && cached.loaded_at.elapsed() < self.ttl {
                tracing::debug!(path = %path.display(), "policy table served from cache");
                return Arc::clone(&cached.table);
            }
        }

        match Self::read_table(path) {
            Ok(table) => {
                for shadow in table.shadowed_rules() {
                    tracing::warn!(
                        path = %path.display(),
                        rule = shadow.index,
                        shadowed_by = shadow.shadowed_by,
                        "policy rule can never match; an earlier rule always wins"
                    );
                }
                tracing::info!(
                    path = %path.display(),
                    version = %table.version,
                    rules = table.rules.len(),
                    "policy table loaded"
                );
                let table = Arc::new(table);
                *cache = Some(CachedTable {
                    path: path.to_path_buf(),
                    table: Arc::clone(&table),
                    loaded_at: Instant::now(),
                });
                table
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "policy table unavailable, using fallback table"
                );
                Arc::clone(&self.fallback)
            }
        }
    }

    /// Drop the cached table so the next load re-reads the source.
    pub fn invalidate(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Read and strictly validate a table file. Errors are returned, not masked.
    pub fn read_table(path: &Path) -> Result<PolicyTable, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        PolicyTable::parse_strict(&content, TableFormat::from_path(path))
    }
}
