use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ProjectError, Result};

/// Image formats the engine indexes by default.
pub const IMG_EXTS: &[&str] = &[".nii", ".nii.gz"];

/// Tabular/text formats kept in the index but filtered out of the default view.
pub const TXT_EXTS: &[&str] = &[".xls", ".xlsx", ".csv", ".tsv", ".json"];

/// Every extension the scanner admits into the index.
pub fn ref_exts() -> Vec<String> {
    IMG_EXTS
        .iter()
        .chain(TXT_EXTS.iter())
        .map(|s| s.to_string())
        .collect()
}

/// Default extension filter applied to the consumer-facing view.
pub fn default_ext_filter() -> Vec<String> {
    IMG_EXTS.iter().map(|s| s.to_string()).collect()
}

/// The three fixed top-level data classes of a project.
///
/// Exactly one is active in a [`Project`](crate::Project) at a time. The
/// on-disk directory names are part of the project layout contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    RawData,
    Processing,
    Results,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::RawData, Category::Processing, Category::Results];

    /// Directory name under the project root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::RawData => "Data",
            Category::Processing => "Processing",
            Category::Results => "Results",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Category::RawData => 0,
            Category::Processing => 1,
            Category::Results => 2,
        }
    }

    pub fn from_index(idx: usize) -> Result<Category> {
        match idx {
            0 => Ok(Category::RawData),
            1 => Ok(Category::Processing),
            2 => Ok(Category::Results),
            _ => Err(ProjectError::InvalidCategory),
        }
    }

    /// Parse a category from a directory name or a numeric index.
    pub fn parse(s: &str) -> Result<Category> {
        if let Ok(idx) = s.parse::<usize>() {
            return Category::from_index(idx);
        }
        match s {
            "Data" | "RawData" => Ok(Category::RawData),
            "Processing" => Ok(Category::Processing),
            "Results" => Ok(Category::Results),
            _ => Err(ProjectError::InvalidCategory),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One discovered file, before semantic naming.
///
/// `hierarchy` holds the directory-name segments between the project root and
/// the file, so segment 0 is always the category directory itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub hierarchy: Vec<String>,
    pub filename: String,
    pub abspath: PathBuf,
}

/// A [`FileRecord`] with named fields assigned per the category schema.
///
/// Which optional fields are populated depends on the category:
/// RawData carries `datatype`, Processing carries `pipeline` + `step`,
/// Results carries `pipeline` + `report`. `session` is absent in
/// single-session layouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    pub filename: String,
    pub abspath: PathBuf,
}

/// Value shapes accepted by keyword filter options.
///
/// `Disabled` is only meaningful for the extension filter, where it clears
/// the allow-list entirely; handing it to a tag option is a type error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Set(Vec<String>),
    Disabled,
}

impl FilterValue {
    /// Coerce into a list of values, or fail with the given option name.
    pub fn into_values(self, option: &str) -> Result<Vec<String>> {
        match self {
            FilterValue::Text(v) => Ok(vec![v]),
            FilterValue::Set(vs) => Ok(vs),
            FilterValue::Disabled => Err(ProjectError::InvalidFilterValueType {
                option: option.to_string(),
            }),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(vs: Vec<String>) -> Self {
        FilterValue::Set(vs)
    }
}
