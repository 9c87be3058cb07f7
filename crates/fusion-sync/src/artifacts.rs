//! Transient download artifacts and their cleanup
//!
//! Jobs record every file or directory they create on the way to a database
//! (downloads, extracted trees, converted sheets). The orchestrator drains
//! the ledger once, after every job has joined.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ArtifactLedger {
    paths: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl ArtifactLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!(path = %path.display(), "Recorded artifact");
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path);
    }

    pub fn len(&self) -> usize {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    /// Take every recorded path, leaving the ledger empty
    pub fn drain(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.paths.lock().unwrap_or_else(PoisonError::into_inner))
            .into_iter()
            .collect()
    }
}

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub removed: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Remove files and directory trees.
///
/// Paths that are already gone count as `missing`. Removal errors are logged
/// and counted, never raised: a leftover temp file must not turn a
/// successful sync into a failed one.
pub fn remove_artifacts(paths: impl IntoIterator<Item = PathBuf>) -> CleanupStats {
    let mut stats = CleanupStats::default();

    for path in paths {
        let result = match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&path),
            Ok(_) => std::fs::remove_file(&path),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                debug!(path = %path.display(), "Removed artifact");
                stats.removed += 1;
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => stats.missing += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove artifact");
                stats.failed += 1;
            },
        }
    }

    stats
}
