pub mod classify;
pub mod error;
pub mod filter;
pub mod index;
pub mod project;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use error::{ProjectError, Result};
pub use filter::FilterSet;
pub use index::ProjectIndex;
pub use project::Project;
pub use scanner::ScanOutcome;
pub use types::{Category, ClassifiedRecord, FileRecord, FilterValue};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
