//! Directory-tree scanner for one category root.

use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::classify::path_segments;
use crate::types::{Category, FileRecord};

/// Outcome of walking one category root.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub records: Vec<FileRecord>,
    /// True when no files were found, or the tree has no depth below the
    /// category directory.
    pub empty: bool,
}

/// Recursively walk `root/<category dir>` and emit one record per non-hidden
/// file.
///
/// A missing root is an empty project, not an error: category directories are
/// created lazily by the owning [`Project`](crate::Project) and may not have
/// received any data yet. Unreadable entries are skipped.
pub fn scan(root: &Path, category: Category) -> ScanOutcome {
    let base = root.join(category.dir_name());
    let mut records = Vec::new();

    for entry in WalkDir::new(&base).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        if filename.starts_with('.') {
            continue;
        }
        let Some(parent) = entry.path().parent() else {
            continue;
        };
        let Some(hierarchy) = path_segments(root, parent) else {
            continue;
        };
        records.push(FileRecord {
            hierarchy,
            filename,
            abspath: entry.path().to_path_buf(),
        });
    }

    let max_depth = records
        .iter()
        .map(|r| r.hierarchy.len())
        .max()
        .unwrap_or(0);
    let empty = records.is_empty() || max_depth < 2;
    if empty {
        debug!(category = %category, path = %base.display(), "scan found no usable files");
    } else {
        info!(category = %category, files = records.len(), "scanned category root");
    }
    ScanOutcome { records, empty }
}
