pub mod config;
pub mod error;
pub mod file_tree;
pub mod findings;
pub mod layers;
pub mod llm;
pub mod orchestrator;
pub mod project_checks;
pub mod reporter;
pub mod taxonomy;
pub mod validators;

pub use config::Config;
pub use error::ReviewError;
pub use file_tree::{FileTree, FileTreeCollector};
pub use findings::{CodeFinding, ProjectFinding, RawComment, TypedFinding, ValidatorResult};
pub use layers::{LayerAssignment, LayerClassifier};
pub use llm::{Completion, LLMClient};
pub use orchestrator::{ReviewTask, Reviewer};
pub use reporter::{Report, ReportFormat, Reporter};
pub use taxonomy::CategoryTaxonomy;
pub use validators::{FileContext, Validator, ValidatorSet};

pub type Result<T> = anyhow::Result<T>;
