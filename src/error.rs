use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProjectError>;

/// Errors raised by the indexing and filtering engine.
///
/// Scanning problems (missing or unreadable directories) are never surfaced
/// here; they collapse to an empty index. Cache read failures are recovered
/// by a rescan. Only filter/query misuse and broken invariants reach the
/// caller.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("category index out of range (expected 0..3)")]
    InvalidCategory,

    #[error("'{0}' is not a recognized filter option")]
    UnrecognizedOption(String),

    #[error("invalid value for filter option '{option}': expected a string or a list of strings")]
    InvalidFilterValueType { option: String },

    #[error("no filtered output for {0:?}: values match neither the index nor an on-disk step")]
    NoFilteredOutput(Vec<String>),

    #[error("project is empty, nothing to iterate")]
    EmptyProject,

    #[error("failed to update derived project attributes: {0}")]
    AttributeUpdateFailure(String),
}
