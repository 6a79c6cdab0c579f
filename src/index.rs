//! The classified record set for one category, with a persistent cache.
//!
//! Every successful scan overwrites a hidden snapshot file inside the
//! category directory; a non-forced reset prefers that snapshot and only
//! rescans on a cache miss. The artifact carries no cross-version guarantee,
//! so any parse failure is treated as a soft miss.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify;
use crate::scanner;
use crate::types::{Category, ClassifiedRecord};

/// Hidden cache artifact name inside each category directory.
pub const CACHE_FILE: &str = ".class_index";

#[derive(Serialize, Deserialize)]
struct CacheSnapshot {
    records: Vec<ClassifiedRecord>,
}

/// Owns the classified records for one category of one project root.
///
/// Mutated only by its own `scan`/`load`/`reset`; never partially updated.
#[derive(Debug, Clone)]
pub struct ProjectIndex {
    root: PathBuf,
    category: Category,
    records: Vec<ClassifiedRecord>,
    single_session: bool,
    empty_project: bool,
}

impl ProjectIndex {
    /// An unscanned, empty index. Call [`reset`](Self::reset) to populate it.
    pub fn new(root: &Path, category: Category) -> Self {
        Self {
            root: root.to_path_buf(),
            category,
            records: Vec::new(),
            single_session: false,
            empty_project: true,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn records(&self) -> &[ClassifiedRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.empty_project
    }

    pub fn single_session(&self) -> bool {
        self.single_session
    }

    fn cache_path(&self) -> PathBuf {
        self.root.join(self.category.dir_name()).join(CACHE_FILE)
    }

    /// Walk the category root, classify what was found, and overwrite the
    /// cache artifact.
    pub fn scan(&mut self) {
        let outcome = scanner::scan(&self.root, self.category);
        match classify::resolve(self.category, &outcome.records) {
            Some(layout) => {
                let mut records = classify::classify(self.category, outcome.records, layout);
                // Only files in a known format enter the index.
                let allowed = crate::types::ref_exts();
                records.retain(|r| allowed.iter().any(|ext| r.filename.ends_with(ext)));
                self.single_session = layout.single_session;
                self.records = records;
            }
            None => {
                self.records = Vec::new();
            }
        }
        self.empty_project = self.records.is_empty();
        self.save_cache();
    }

    /// Replace-on-write: drop the old artifact, then serialize fresh. A
    /// write failure never propagates; the index itself is already valid.
    fn save_cache(&self) {
        let path = self.cache_path();
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                warn!(path = %path.display(), %err, "could not remove stale cache artifact");
            }
        }
        let snapshot = CacheSnapshot {
            records: self.records.clone(),
        };
        let result = serde_json::to_vec(&snapshot)
            .map_err(|e| e.to_string())
            .and_then(|bytes| fs::write(&path, bytes).map_err(|e| e.to_string()));
        match result {
            Ok(()) => debug!(path = %path.display(), records = self.records.len(), "cache written"),
            Err(err) => warn!(path = %path.display(), error = %err, "cache write failed, continuing without"),
        }
    }

    /// Try to restore the index from the cache artifact.
    ///
    /// Returns `false` on a missing or unparseable artifact so the caller can
    /// fall back to a scan. The session layout is re-derived from the loaded
    /// column shape (a single-session table has no session column).
    pub fn load(&mut self) -> bool {
        let path = self.cache_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let snapshot: CacheSnapshot = match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(path = %path.display(), %err, "unparseable cache artifact, rescanning");
                return false;
            }
        };
        self.single_session = !snapshot.records.iter().any(|r| r.session.is_some());
        self.empty_project = snapshot.records.is_empty();
        self.records = snapshot.records;
        debug!(path = %path.display(), records = self.records.len(), "cache loaded");
        true
    }

    /// Refresh the index.
    ///
    /// `rescan = false` prefers the cache and scans only on a miss.
    /// `rescan = true` unconditionally rescans Processing and Results first
    /// (their trees grow as pipelines produce output), then the active
    /// category.
    pub fn reset(&mut self, rescan: bool) {
        if rescan {
            for category in [Category::Processing, Category::Results] {
                if category != self.category {
                    ProjectIndex::new(&self.root, category).scan();
                }
            }
            self.scan();
        } else if !self.load() {
            self.scan();
        }
    }
}
