//! The consumer-facing project handle.
//!
//! A [`Project`] composes one [`ProjectIndex`] (for the active category) with
//! one [`FilterSet`]. The filtered view and every distinct-value accessor are
//! recomputed on demand from that pair, so there is no derived state to keep
//! in sync. Scoped sub-views are deep clones and never alias the parent.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ProjectError, Result};
use crate::filter::{self, FilterSet};
use crate::index::ProjectIndex;
use crate::types::{Category, ClassifiedRecord, FilterValue};

/// A project root with an active category, a cached index, and filters.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    index: ProjectIndex,
    filters: FilterSet,
}

impl Project {
    /// Open a project root.
    ///
    /// Creates the three category directories if absent, scans all three, and
    /// selects the highest-indexed non-empty category as the active view
    /// (Results over Processing over RawData, the most downstream populated
    /// data being the most useful default). When all three are empty the
    /// last-scanned category stays selected with a zero-length view.
    pub fn open(path: impl AsRef<Path>) -> Project {
        let path = path.as_ref();
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        for category in Category::ALL {
            let dir = root.join(category.dir_name());
            if let Err(err) = fs::create_dir_all(&dir) {
                warn!(path = %dir.display(), %err, "could not create category directory");
            }
        }

        let mut chosen: Option<ProjectIndex> = None;
        let mut fallback: Option<ProjectIndex> = None;
        for category in Category::ALL {
            let mut index = ProjectIndex::new(&root, category);
            index.scan();
            if !index.is_empty() {
                chosen = Some(index);
            } else if category == Category::Results {
                fallback = Some(index);
            }
        }
        let index = chosen
            .or(fallback)
            .unwrap_or_else(|| ProjectIndex::new(&root, Category::Results));
        info!(root = %root.display(), category = %index.category(), "project opened");

        Project {
            root,
            index,
            filters: FilterSet::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn category(&self) -> Category {
        self.index.category()
    }

    pub fn single_session(&self) -> bool {
        self.index.single_session()
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Switch the active category, reloading its index (cache-first) and
    /// resetting the filters.
    pub fn set_category(&mut self, category: Category) {
        if category != self.index.category() {
            debug!(from = %self.index.category(), to = %category, "switching category");
        }
        let mut index = ProjectIndex::new(&self.root, category);
        index.reset(false);
        self.index = index;
        self.filters.reset(None);
    }

    /// Switch category by name or numeric index, failing with
    /// [`ProjectError::InvalidCategory`] on anything outside the fixed set.
    pub fn set_category_by_name(&mut self, name: &str) -> Result<()> {
        let category = Category::parse(name)?;
        self.set_category(category);
        Ok(())
    }

    /// The filtered view: active index records passed through the filter set.
    /// Recomputed on every call so it always reflects the latest mutation.
    pub fn records(&self) -> Vec<&ClassifiedRecord> {
        filter::apply(self.index.records(), &self.filters, self.category())
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.records().is_empty()
    }

    /// Row lookup into the filtered view. `None` when out of range or empty.
    pub fn get(&self, index: usize) -> Option<&ClassifiedRecord> {
        self.records().get(index).copied()
    }

    /// Iterate `(row index, record)` pairs of the filtered view.
    ///
    /// An empty view is an error rather than a silent zero-item iterator:
    /// callers must not mistake "no filter matched" for "nothing to do".
    pub fn iter(&self) -> Result<impl Iterator<Item = (usize, &ClassifiedRecord)>> {
        let view = self.records();
        if view.is_empty() {
            return Err(ProjectError::EmptyProject);
        }
        Ok(view.into_iter().enumerate())
    }

    /// Force-rescan the downstream categories and the active one, keeping the
    /// current filters applied to the fresh index.
    pub fn reload(&mut self) {
        self.index.reset(true);
    }

    /// Clear all filter slots; `ext` restores the extension allow-list
    /// (image formats when `None`).
    pub fn reset_filters(&mut self, ext: Option<Vec<String>>) {
        self.filters.reset(ext);
    }

    /// Override the extension allow-list. `Disabled` or an empty set clears
    /// it entirely.
    pub fn set_ext(&mut self, value: FilterValue) {
        self.filters.ext = match value {
            FilterValue::Text(v) => Some(vec![v]),
            FilterValue::Set(vs) if vs.is_empty() => None,
            FilterValue::Set(vs) => Some(vs),
            FilterValue::Disabled => None,
        };
    }

    // Distinct values over the filtered view. `None` when the dimension does
    // not apply to the active category or the view is empty.

    pub fn subjects(&self) -> Option<Vec<String>> {
        distinct(&self.records(), |r| Some(&r.subject))
    }

    pub fn sessions(&self) -> Option<Vec<String>> {
        if self.index.single_session() {
            return None;
        }
        distinct(&self.records(), |r| r.session.as_ref())
    }

    pub fn datatypes(&self) -> Option<Vec<String>> {
        match self.category() {
            Category::RawData => distinct(&self.records(), |r| r.datatype.as_ref()),
            _ => None,
        }
    }

    pub fn pipelines(&self) -> Option<Vec<String>> {
        match self.category() {
            Category::Processing | Category::Results => {
                distinct(&self.records(), |r| r.pipeline.as_ref())
            }
            Category::RawData => None,
        }
    }

    pub fn steps(&self) -> Option<Vec<String>> {
        match self.category() {
            Category::Processing => distinct(&self.records(), |r| r.step.as_ref()),
            _ => None,
        }
    }

    pub fn results(&self) -> Option<Vec<String>> {
        match self.category() {
            Category::Results => distinct(&self.records(), |r| r.report.as_ref()),
            _ => None,
        }
    }

    /// Set filters from positional hierarchy values and keyword options.
    ///
    /// Positional values are resolved against the index's distinct values in
    /// fixed order (subject, then session for multi-session layouts, then
    /// datatype/pipeline, then step/report), each match leaving the residual
    /// pool. Keywords: `dataclass`, `ext`, `file_tag`, `ignore`.
    pub fn set_filters<S: AsRef<str>>(
        &mut self,
        args: &[S],
        kwargs: &[(&str, FilterValue)],
    ) -> Result<()> {
        // dataclass switches the index first; a category switch resets the
        // filters, so it must not clobber the other keywords.
        for (key, value) in kwargs {
            if *key == "dataclass" {
                let name = match value {
                    FilterValue::Text(v) => v.clone(),
                    _ => {
                        return Err(ProjectError::InvalidFilterValueType {
                            option: "dataclass".to_string(),
                        })
                    }
                };
                self.set_category_by_name(&name)?;
            }
        }

        let ext = self.filters.ext.clone();
        self.filters.reset(ext);

        for (key, value) in kwargs {
            match *key {
                "dataclass" => {}
                "ext" => self.set_ext(value.clone()),
                "file_tag" => {
                    self.filters.include_tags = Some(value.clone().into_values("file_tag")?)
                }
                "ignore" => {
                    self.filters.exclude_tags = Some(value.clone().into_values("ignore")?)
                }
                other => return Err(ProjectError::UnrecognizedOption(other.to_string())),
            }
        }

        if args.is_empty() {
            return Ok(());
        }
        let args: Vec<String> = args.iter().map(|s| s.as_ref().to_string()).collect();
        let mut residuals = args.clone();
        residuals.sort();
        residuals.dedup();

        if let Some(subjects) = self.index_dimension(|r| Some(&r.subject), "Subject")? {
            let matched = filter::consume_matches(&args, &mut residuals, &subjects);
            filter::extend_slot(&mut self.filters.subject, matched);
            if !self.index.single_session() {
                if let Some(sessions) = self.index_dimension(|r| r.session.as_ref(), "Session")? {
                    let matched = filter::consume_matches(&args, &mut residuals, &sessions);
                    filter::extend_slot(&mut self.filters.session, matched);
                }
            }
        }

        let mut pipeline_matches: Vec<String> = Vec::new();
        match self.category() {
            Category::RawData => {
                if let Some(dtypes) = self.index_dimension(|r| r.datatype.as_ref(), "DataType")? {
                    let matched = filter::consume_matches(&args, &mut residuals, &dtypes);
                    filter::extend_slot(&mut self.filters.dim1, matched);
                }
            }
            Category::Processing => {
                if let Some(pipes) = self.index_dimension(|r| r.pipeline.as_ref(), "Pipeline")? {
                    pipeline_matches = filter::consume_matches(&args, &mut residuals, &pipes);
                    filter::extend_slot(&mut self.filters.dim1, pipeline_matches.clone());
                }
                if let Some(steps) = self.index_dimension(|r| r.step.as_ref(), "Step")? {
                    let matched = filter::consume_matches(&args, &mut residuals, &steps);
                    filter::extend_slot(&mut self.filters.dim2, matched);
                }
            }
            Category::Results => {
                if let Some(pipes) = self.index_dimension(|r| r.pipeline.as_ref(), "Pipeline")? {
                    let matched = filter::consume_matches(&args, &mut residuals, &pipes);
                    filter::extend_slot(&mut self.filters.dim1, matched);
                }
                if let Some(reports) = self.index_dimension(|r| r.report.as_ref(), "Report")? {
                    let matched = filter::consume_matches(&args, &mut residuals, &reports);
                    filter::extend_slot(&mut self.filters.dim2, matched);
                }
            }
        }

        if residuals.is_empty() {
            return Ok(());
        }
        self.accept_processing_residuals(residuals, &pipeline_matches)
    }

    /// Compatibility quirk: a residual is accepted verbatim as a step filter
    /// when the active category is Processing, exactly one pipeline matched,
    /// and every residual names an existing sub-step directory that the last
    /// scan has not captured yet (pipeline output produced since then). Do
    /// not extend this to other categories.
    fn accept_processing_residuals(
        &mut self,
        residuals: Vec<String>,
        pipeline_matches: &[String],
    ) -> Result<()> {
        if self.category() != Category::Processing || pipeline_matches.len() != 1 {
            return Err(ProjectError::NoFilteredOutput(residuals));
        }
        let pipeline_dir = self
            .root
            .join(Category::Processing.dir_name())
            .join(&pipeline_matches[0]);
        let all_on_disk = residuals.iter().all(|step| pipeline_dir.join(step).is_dir());
        if !all_on_disk {
            return Err(ProjectError::NoFilteredOutput(residuals));
        }
        debug!(?residuals, "accepting on-disk steps not yet in the index");
        filter::extend_slot(&mut self.filters.dim2, residuals);
        Ok(())
    }

    /// Deep-clone the project, switch the clone's category, and apply the
    /// given filters. The clone owns its own index and filters, so callers
    /// can mutate or hand it to a worker without touching this project.
    pub fn scoped<S: AsRef<str>>(
        &self,
        category: Category,
        args: &[S],
        kwargs: &[(&str, FilterValue)],
    ) -> Result<Project> {
        let mut view = self.clone();
        view.set_category(category);
        view.set_filters(args, kwargs)?;
        Ok(view)
    }

    /// Distinct values of one dimension over the *unfiltered* index, used to
    /// resolve positional filter arguments. A record lacking a field the
    /// category schema requires means the index broke its own invariant.
    fn index_dimension<F>(&self, field: F, name: &str) -> Result<Option<Vec<String>>>
    where
        F: Fn(&ClassifiedRecord) -> Option<&String>,
    {
        let records = self.index.records();
        if records.is_empty() {
            return Ok(None);
        }
        let mut values = Vec::with_capacity(records.len());
        for record in records {
            match field(record) {
                Some(v) => values.push(v.clone()),
                None => {
                    return Err(ProjectError::AttributeUpdateFailure(format!(
                        "record {} has no {} field",
                        record.abspath.display(),
                        name
                    )))
                }
            }
        }
        values.sort();
        values.dedup();
        Ok(Some(values))
    }

    /// Human-readable overview of the active view and applied filters.
    pub fn summary(&self) -> String {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string());
        let mut out = format!("** Project summary\nProject: {name}");
        if self.index.is_empty() {
            out.push_str("\n[Empty project]");
            return out;
        }
        out.push_str(&format!("\nSelected category: {}", self.category()));
        if let Some(pipes) = self.pipelines() {
            out.push_str(&format!("\nApplied Pipeline(s): {pipes:?}"));
        }
        if let Some(steps) = self.steps() {
            out.push_str(&format!("\nApplied Step(s): {steps:?}"));
        }
        if let Some(results) = self.results() {
            out.push_str(&format!("\nProcessed Result(s): {results:?}"));
        }
        if let Some(subjects) = self.subjects() {
            out.push_str(&format!("\nSubject(s): {subjects:?}"));
        }
        if let Some(sessions) = self.sessions() {
            out.push_str(&format!("\nSession(s): {sessions:?}"));
        }
        if let Some(dtypes) = self.datatypes() {
            out.push_str(&format!("\nDataType(s): {dtypes:?}"));
        }
        if self.single_session() {
            out.push_str("\nSingle session dataset");
        }
        out.push_str("\n\nApplied filters");
        if let Some(v) = &self.filters.subject {
            out.push_str(&format!("\nSet subject(s): {v:?}"));
        }
        if let Some(v) = &self.filters.session {
            out.push_str(&format!("\nSet session(s): {v:?}"));
        }
        if let Some(v) = &self.filters.dim1 {
            match self.category() {
                Category::RawData => out.push_str(&format!("\nSet datatype(s): {v:?}")),
                _ => out.push_str(&format!("\nSet Pipeline(s): {v:?}")),
            }
        }
        if let Some(v) = &self.filters.dim2 {
            match self.category() {
                Category::Processing => out.push_str(&format!("\nSet Step(s): {v:?}")),
                Category::Results => out.push_str(&format!("\nSet Result(s): {v:?}")),
                Category::RawData => {}
            }
        }
        if let Some(v) = &self.filters.ext {
            out.push_str(&format!("\nSet file extension(s): {v:?}"));
        }
        if let Some(v) = &self.filters.include_tags {
            out.push_str(&format!("\nSet file tag(s): {v:?}"));
        }
        if let Some(v) = &self.filters.exclude_tags {
            out.push_str(&format!("\nSet ignore(s): {v:?}"));
        }
        out
    }
}

fn distinct<F>(view: &[&ClassifiedRecord], field: F) -> Option<Vec<String>>
where
    F: Fn(&ClassifiedRecord) -> Option<&String>,
{
    if view.is_empty() {
        return None;
    }
    let mut values: Vec<String> = view.iter().filter_map(|r| field(r)).cloned().collect();
    values.sort();
    values.dedup();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn multi_session_project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Data/sub01/ses01/func/sub01_task-rest.nii");
        touch(tmp.path(), "Data/sub01/ses01/func/sub01_task-rest-bad.nii");
        touch(tmp.path(), "Data/sub01/ses02/func/sub01_task-motor.nii");
        touch(tmp.path(), "Data/sub02/ses01/anat/sub02_T1w.nii.gz");
        tmp
    }

    fn processed_project() -> TempDir {
        let tmp = multi_session_project();
        touch(tmp.path(), "Processing/pipeA/010_mc/sub01/ses01/a.nii");
        touch(tmp.path(), "Processing/pipeA/010_mc/sub02/ses01/b.nii");
        touch(tmp.path(), "Processing/pipeA/020_reg/sub01/ses01/c.nii");
        tmp
    }

    #[test]
    fn open_creates_category_directories() {
        let tmp = TempDir::new().unwrap();
        let project = Project::open(tmp.path());
        for category in Category::ALL {
            assert!(tmp.path().join(category.dir_name()).is_dir());
        }
        assert_eq!(project.len(), 0);
    }

    #[test]
    fn open_selects_highest_populated_category() {
        let tmp = multi_session_project();
        let project = Project::open(tmp.path());
        assert_eq!(project.category(), Category::RawData);

        let tmp = processed_project();
        let project = Project::open(tmp.path());
        assert_eq!(project.category(), Category::Processing);
    }

    #[test]
    fn empty_project_keeps_default_category_with_zero_length() {
        let tmp = TempDir::new().unwrap();
        let project = Project::open(tmp.path());
        assert_eq!(project.category(), Category::Results);
        assert_eq!(project.len(), 0);
        assert!(project.is_empty());
    }

    #[test]
    fn distinct_accessors_follow_the_category() {
        let tmp = processed_project();
        let mut project = Project::open(tmp.path());
        assert_eq!(project.category(), Category::Processing);
        assert_eq!(
            project.pipelines().unwrap(),
            vec!["pipeA".to_string()]
        );
        assert_eq!(
            project.steps().unwrap(),
            vec!["010_mc".to_string(), "020_reg".to_string()]
        );
        assert!(project.datatypes().is_none());

        project.set_category(Category::RawData);
        assert_eq!(
            project.subjects().unwrap(),
            vec!["sub01".to_string(), "sub02".to_string()]
        );
        assert_eq!(
            project.datatypes().unwrap(),
            vec!["anat".to_string(), "func".to_string()]
        );
        assert!(project.pipelines().is_none());
    }

    #[test]
    fn positional_filters_resolve_in_hierarchy_order() {
        let tmp = multi_session_project();
        let mut project = Project::open(tmp.path());
        project.set_filters(&["sub01", "ses01", "func"], &[]).unwrap();
        assert_eq!(project.filters().subject.as_deref(), Some(&["sub01".to_string()][..]));
        assert_eq!(project.filters().session.as_deref(), Some(&["ses01".to_string()][..]));
        assert_eq!(project.filters().dim1.as_deref(), Some(&["func".to_string()][..]));
        assert_eq!(project.len(), 2);
    }

    #[test]
    fn tag_filters_compose_with_ignore() {
        let tmp = multi_session_project();
        let mut project = Project::open(tmp.path());
        project
            .set_filters(
                &[] as &[&str],
                &[
                    ("file_tag", FilterValue::from("task-rest")),
                    ("ignore", FilterValue::from("task-rest-bad")),
                ],
            )
            .unwrap();
        let view = project.records();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].filename, "sub01_task-rest.nii");
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        let tmp = multi_session_project();
        let mut project = Project::open(tmp.path());
        let err = project
            .set_filters(&[] as &[&str], &[("bogus", FilterValue::from("x"))])
            .unwrap_err();
        assert!(matches!(err, ProjectError::UnrecognizedOption(key) if key == "bogus"));
    }

    #[test]
    fn unresolved_residual_is_an_error() {
        let tmp = processed_project();
        let mut project = Project::open(tmp.path());
        let err = project
            .set_filters(&["sub01", "nonexistent-pipeline"], &[])
            .unwrap_err();
        assert!(matches!(err, ProjectError::NoFilteredOutput(_)));
    }

    #[test]
    fn on_disk_step_residual_is_accepted_for_processing() {
        let tmp = processed_project();
        let mut project = Project::open(tmp.path());
        assert_eq!(project.category(), Category::Processing);

        // A step directory created after the last scan: present on disk, not
        // in the index.
        fs::create_dir_all(tmp.path().join("Processing/pipeA/030_smooth/sub01/ses01")).unwrap();
        project.set_filters(&["pipeA", "030_smooth"], &[]).unwrap();
        assert_eq!(
            project.filters().dim2.as_deref(),
            Some(&["030_smooth".to_string()][..])
        );
    }

    #[test]
    fn dataclass_keyword_switches_before_filtering() {
        let tmp = processed_project();
        let mut project = Project::open(tmp.path());
        project
            .set_filters(
                &["sub02", "anat"],
                &[("dataclass", FilterValue::from("Data"))],
            )
            .unwrap();
        assert_eq!(project.category(), Category::RawData);
        assert_eq!(project.len(), 1);
        assert_eq!(project.records()[0].filename, "sub02_T1w.nii.gz");
    }

    #[test]
    fn ext_keyword_overrides_the_allow_list() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Data/sub01/anat/a.nii");
        touch(tmp.path(), "Data/sub01/anat/a.json");
        let mut project = Project::open(tmp.path());
        assert_eq!(project.len(), 1);

        project
            .set_filters(&[] as &[&str], &[("ext", FilterValue::from(".json"))])
            .unwrap();
        let view = project.records();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].filename, "a.json");

        // Disabling the list exposes every indexed record.
        project.set_ext(FilterValue::Disabled);
        assert_eq!(project.len(), 2);
    }

    #[test]
    fn iteration_fails_on_empty_view_while_len_is_zero() {
        let tmp = multi_session_project();
        let mut project = Project::open(tmp.path());
        project
            .set_filters(&[] as &[&str], &[("file_tag", FilterValue::from("no-such-tag"))])
            .unwrap();
        assert_eq!(project.len(), 0);
        assert!(matches!(project.iter(), Err(ProjectError::EmptyProject)));
    }

    #[test]
    fn iteration_yields_indexed_rows() {
        let tmp = multi_session_project();
        let project = Project::open(tmp.path());
        let rows: Vec<(usize, String)> = project
            .iter()
            .unwrap()
            .map(|(i, r)| (i, r.filename.clone()))
            .collect();
        assert_eq!(rows.len(), project.len());
        assert_eq!(rows[0].0, 0);
    }

    #[test]
    fn scoped_view_is_isolated_from_the_parent() {
        let tmp = multi_session_project();
        let project = Project::open(tmp.path());
        let before = project.len();

        let mut scoped = project
            .scoped(Category::RawData, &["sub01"], &[])
            .unwrap();
        assert!(scoped.len() < before);

        scoped
            .set_filters(&[] as &[&str], &[("file_tag", FilterValue::from("task-motor"))])
            .unwrap();
        assert_eq!(scoped.len(), 1);

        // The parent never observed any of it.
        assert_eq!(project.len(), before);
        assert!(project.filters().subject.is_none());
        assert!(project.filters().include_tags.is_none());
    }

    #[test]
    fn category_switch_resets_filters() {
        let tmp = processed_project();
        let mut project = Project::open(tmp.path());
        project.set_filters(&["sub01"], &[]).unwrap();
        assert!(project.filters().subject.is_some());

        project.set_category(Category::RawData);
        assert!(project.filters().subject.is_none());
    }

    #[test]
    fn invalid_category_name_is_rejected() {
        let tmp = multi_session_project();
        let mut project = Project::open(tmp.path());
        assert!(matches!(
            project.set_category_by_name("NotACategory"),
            Err(ProjectError::InvalidCategory)
        ));
        assert!(matches!(
            project.set_category_by_name("5"),
            Err(ProjectError::InvalidCategory)
        ));
    }

    #[test]
    fn reload_picks_up_new_pipeline_output() {
        let tmp = multi_session_project();
        let mut project = Project::open(tmp.path());
        project.set_category(Category::Processing);
        assert_eq!(project.len(), 0);

        touch(tmp.path(), "Processing/pipeA/010_mc/sub01/ses01/a.nii");
        project.reload();
        assert_eq!(project.len(), 1);
        assert_eq!(project.pipelines().unwrap(), vec!["pipeA".to_string()]);
    }

    #[test]
    fn summary_reports_view_and_filters() {
        let tmp = multi_session_project();
        let mut project = Project::open(tmp.path());
        project.set_filters(&["sub01"], &[]).unwrap();
        let summary = project.summary();
        assert!(summary.contains("Selected category: Data"));
        assert!(summary.contains("Set subject(s)"));
        assert!(summary.contains("sub01"));

        let empty = Project::open(TempDir::new().unwrap().path());
        assert!(empty.summary().contains("[Empty project]"));
    }
}
