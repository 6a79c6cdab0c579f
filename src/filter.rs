//! The filter model: an explicit [`FilterSet`] value plus a pure [`apply`]
//! function. Derived attributes are always recomputed from
//! `(index, filter set)`, never cached, so they cannot drift from their
//! source.

use crate::types::{Category, ClassifiedRecord};

/// Six filter slots plus the extension allow-list.
///
/// `dim1` filters DataType (RawData) or Pipeline (Processing/Results);
/// `dim2` filters Step (Processing) or Report (Results) and has no effect on
/// RawData. Slots left `None` are identity stages. Lives only in memory for
/// the lifetime of a [`Project`](crate::Project).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    pub subject: Option<Vec<String>>,
    pub session: Option<Vec<String>>,
    pub dim1: Option<Vec<String>>,
    pub dim2: Option<Vec<String>>,
    pub include_tags: Option<Vec<String>>,
    pub exclude_tags: Option<Vec<String>>,
    pub ext: Option<Vec<String>>,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            subject: None,
            session: None,
            dim1: None,
            dim2: None,
            include_tags: None,
            exclude_tags: None,
            ext: Some(crate::types::default_ext_filter()),
        }
    }
}

impl FilterSet {
    /// Clear every slot and restore the extension filter (image formats when
    /// `ext` is `None`).
    pub fn reset(&mut self, ext: Option<Vec<String>>) {
        *self = FilterSet {
            ext: Some(ext.unwrap_or_else(crate::types::default_ext_filter)),
            ..FilterSet::default()
        };
    }
}

/// Apply `filters` to `records` for the given category.
///
/// Order-preserving predicate composition: AND across stages, OR within a
/// stage's value set, identity for unset slots.
pub fn apply<'a>(
    records: &'a [ClassifiedRecord],
    filters: &FilterSet,
    category: Category,
) -> Vec<&'a ClassifiedRecord> {
    records
        .iter()
        .filter(|r| matches(r, filters, category))
        .collect()
}

fn matches(record: &ClassifiedRecord, filters: &FilterSet, category: Category) -> bool {
    if let Some(subjects) = &filters.subject {
        if !subjects.contains(&record.subject) {
            return false;
        }
    }
    if let Some(sessions) = &filters.session {
        // Single-session layouts carry no session field; the stage is then
        // an identity.
        if let Some(session) = &record.session {
            if !sessions.contains(session) {
                return false;
            }
        }
    }
    if let Some(values) = &filters.dim1 {
        let field = match category {
            Category::RawData => &record.datatype,
            Category::Processing | Category::Results => &record.pipeline,
        };
        match field {
            Some(v) if values.contains(v) => {}
            _ => return false,
        }
    }
    if let Some(values) = &filters.dim2 {
        let field = match category {
            Category::Processing => Some(&record.step),
            Category::Results => Some(&record.report),
            Category::RawData => None,
        };
        if let Some(field) = field {
            match field {
                Some(v) if values.contains(v) => {}
                _ => return false,
            }
        }
    }
    if let Some(tags) = &filters.include_tags {
        if !tags.iter().any(|t| record.filename.contains(t.as_str())) {
            return false;
        }
    }
    if let Some(tags) = &filters.exclude_tags {
        if tags.iter().any(|t| record.filename.contains(t.as_str())) {
            return false;
        }
    }
    if let Some(exts) = &filters.ext {
        if !exts.iter().any(|e| record.filename.ends_with(e.as_str())) {
            return false;
        }
    }
    true
}

/// Pull the values of `args` that appear in `reference` out of the residual
/// pool.
///
/// Returns the deduplicated matches; each match is removed from `residuals`
/// so no value is counted against two dimensions.
pub fn consume_matches(
    args: &[String],
    residuals: &mut Vec<String>,
    reference: &[String],
) -> Vec<String> {
    let mut matched: Vec<String> = args
        .iter()
        .filter(|a| reference.contains(a))
        .cloned()
        .collect();
    matched.sort();
    matched.dedup();
    residuals.retain(|r| !matched.contains(r));
    matched
}

/// Append values into a slot, creating it when unset.
pub fn extend_slot(slot: &mut Option<Vec<String>>, values: Vec<String>) {
    if values.is_empty() {
        return;
    }
    match slot {
        Some(existing) => existing.extend(values),
        None => *slot = Some(values),
    }
}
