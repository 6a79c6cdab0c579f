//! Path classification and schema resolution.
//!
//! Raw directory names under a category root are not self-describing, so the
//! layout (single-session vs multi-session) is inferred from the *shape* of
//! the hierarchy table: stack every hierarchy tuple as a row, pad ragged rows,
//! and count columns. The heuristic is deliberately positional; keeping it
//! behind this module lets an explicit-schema mode replace it later without
//! touching scanning or filtering.

use std::path::{Component, Path};

use crate::types::{Category, ClassifiedRecord, FileRecord};

/// Detected project layout for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub single_session: bool,
}

/// Split the directory-name segments between `root` and `dir`.
///
/// Case-preserved, separator-split only, no I/O. Returns `None` when `dir`
/// is not under `root`.
pub fn path_segments(root: &Path, dir: &Path) -> Option<Vec<String>> {
    let rel = dir.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(seg) => Some(seg.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect(),
    )
}

/// Stacked-table column count: deepest hierarchy tuple plus the Filename and
/// Abspath columns.
fn column_count(records: &[FileRecord]) -> usize {
    let depth = records
        .iter()
        .map(|r| r.hierarchy.len())
        .max()
        .unwrap_or(0);
    if depth == 0 {
        0
    } else {
        depth + 2
    }
}

/// Infer the layout for `category` from the record set's shape.
///
/// Returns `None` for a degenerate table (no records, or no depth below the
/// category directory); the project is flagged empty upstream and resolution
/// is skipped.
pub fn resolve(category: Category, records: &[FileRecord]) -> Option<Layout> {
    let max_depth = records
        .iter()
        .map(|r| r.hierarchy.len())
        .max()
        .unwrap_or(0);
    if records.is_empty() || max_depth < 2 {
        return None;
    }
    let columns = column_count(records);
    let single_session = match category {
        Category::RawData => columns == 5,
        Category::Processing | Category::Results => columns == 6,
    };
    Some(Layout { single_session })
}

/// Assign semantic field names positionally and reorder into the canonical
/// column order for the category. Records too shallow for the schema are
/// dropped.
pub fn classify(
    category: Category,
    records: Vec<FileRecord>,
    layout: Layout,
) -> Vec<ClassifiedRecord> {
    let mut out: Vec<ClassifiedRecord> = records
        .into_iter()
        .filter_map(|r| classify_one(category, r, layout))
        .collect();
    out.sort_by(|a, b| a.abspath.cmp(&b.abspath));
    out
}

fn classify_one(
    category: Category,
    record: FileRecord,
    layout: Layout,
) -> Option<ClassifiedRecord> {
    // hierarchy[0] is the category directory itself.
    let h = &record.hierarchy;
    let (subject, session, datatype, pipeline, step, report) = match category {
        Category::RawData => {
            if layout.single_session {
                (h.get(1)?, None, Some(h.get(2)?), None, None, None)
            } else {
                (h.get(1)?, Some(h.get(2)?), Some(h.get(3)?), None, None, None)
            }
        }
        Category::Processing => {
            let session = if layout.single_session {
                None
            } else {
                Some(h.get(4)?)
            };
            (h.get(3)?, session, None, Some(h.get(1)?), Some(h.get(2)?), None)
        }
        Category::Results => {
            let session = if layout.single_session {
                None
            } else {
                Some(h.get(4)?)
            };
            (h.get(3)?, session, None, Some(h.get(1)?), None, Some(h.get(2)?))
        }
    };
    Some(ClassifiedRecord {
        subject: subject.clone(),
        session: session.cloned(),
        datatype: datatype.cloned(),
        pipeline: pipeline.cloned(),
        step: step.cloned(),
        report: report.cloned(),
        filename: record.filename,
        abspath: record.abspath,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(segments: &[&str], filename: &str) -> FileRecord {
        let mut abspath = PathBuf::from("/proj");
        for seg in segments {
            abspath.push(seg);
        }
        abspath.push(filename);
        FileRecord {
            hierarchy: segments.iter().map(|s| s.to_string()).collect(),
            filename: filename.to_string(),
            abspath,
        }
    }

    #[test]
    fn segments_are_relative_to_root() {
        let root = Path::new("/proj");
        let dir = Path::new("/proj/Data/sub01/anat");
        assert_eq!(
            path_segments(root, dir).unwrap(),
            vec!["Data".to_string(), "sub01".to_string(), "anat".to_string()]
        );
        assert!(path_segments(root, Path::new("/elsewhere")).is_none());
    }

    #[test]
    fn rawdata_five_columns_is_single_session() {
        // Data/sub01/anat -> 3 segments + Filename + Abspath = 5 columns.
        let records = vec![record(&["Data", "sub01", "anat"], "a.nii")];
        let layout = resolve(Category::RawData, &records).unwrap();
        assert!(layout.single_session);
    }

    #[test]
    fn rawdata_six_columns_is_multi_session() {
        let records = vec![record(&["Data", "sub01", "ses01", "anat"], "a.nii")];
        let layout = resolve(Category::RawData, &records).unwrap();
        assert!(!layout.single_session);
    }

    #[test]
    fn processing_six_columns_is_single_session() {
        let records = vec![record(&["Processing", "pipeA", "010_mc", "sub01"], "a.nii")];
        let layout = resolve(Category::Processing, &records).unwrap();
        assert!(layout.single_session);

        let records = vec![record(
            &["Processing", "pipeA", "010_mc", "sub01", "ses01"],
            "a.nii",
        )];
        let layout = resolve(Category::Processing, &records).unwrap();
        assert!(!layout.single_session);
    }

    #[test]
    fn degenerate_trees_resolve_to_none() {
        assert!(resolve(Category::RawData, &[]).is_none());
        // Files directly under the category directory have no depth.
        let records = vec![record(&["Data"], "stray.nii")];
        assert!(resolve(Category::RawData, &records).is_none());
    }

    #[test]
    fn rawdata_fields_shift_with_layout() {
        let layout = Layout {
            single_session: true,
        };
        let classified = classify(
            Category::RawData,
            vec![record(&["Data", "sub01", "anat"], "a.nii")],
            layout,
        );
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].subject, "sub01");
        assert_eq!(classified[0].session, None);
        assert_eq!(classified[0].datatype.as_deref(), Some("anat"));

        let layout = Layout {
            single_session: false,
        };
        let classified = classify(
            Category::RawData,
            vec![record(&["Data", "sub01", "ses01", "func"], "b.nii")],
            layout,
        );
        assert_eq!(classified[0].session.as_deref(), Some("ses01"));
        assert_eq!(classified[0].datatype.as_deref(), Some("func"));
    }

    #[test]
    fn processing_and_results_share_tail_order() {
        let layout = Layout {
            single_session: false,
        };
        let classified = classify(
            Category::Processing,
            vec![record(
                &["Processing", "pipeA", "010_mc", "sub01", "ses01"],
                "a.nii",
            )],
            layout,
        );
        let rec = &classified[0];
        assert_eq!(rec.pipeline.as_deref(), Some("pipeA"));
        assert_eq!(rec.step.as_deref(), Some("010_mc"));
        assert_eq!(rec.subject, "sub01");
        assert_eq!(rec.session.as_deref(), Some("ses01"));

        let classified = classify(
            Category::Results,
            vec![record(
                &["Results", "pipeA", "motion_report", "sub01", "ses01"],
                "r.csv",
            )],
            layout,
        );
        assert_eq!(classified[0].report.as_deref(), Some("motion_report"));
        assert_eq!(classified[0].step, None);
    }

    #[test]
    fn too_shallow_records_are_dropped() {
        let layout = Layout {
            single_session: false,
        };
        let classified = classify(
            Category::RawData,
            vec![
                record(&["Data", "sub01", "ses01", "anat"], "keep.nii"),
                record(&["Data", "sub02"], "drop.nii"),
            ],
            layout,
        );
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].filename, "keep.nii");
    }

    #[test]
    fn classification_orders_by_abspath() {
        let layout = Layout {
            single_session: true,
        };
        let classified = classify(
            Category::RawData,
            vec![
                record(&["Data", "sub02", "anat"], "b.nii"),
                record(&["Data", "sub01", "anat"], "a.nii"),
            ],
            layout,
        );
        assert_eq!(classified[0].subject, "sub01");
        assert_eq!(classified[1].subject, "sub02");
    }
}
