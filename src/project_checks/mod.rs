//! Project-level checks that run once per review, before the per-file
//! fan-out, and produce findings without a file or line.

mod requirements;
mod structure;

pub use requirements::ManifestRequirementsMatcher;
pub use structure::DirectoryStructureAnalyzer;

use crate::file_tree::FileTree;
use crate::findings::TypedFinding;
use anyhow::Result;
use std::path::Path;

/// Inspects dependency declarations; zero or one finding.
pub trait RequirementsMatcher: Send + Sync {
    fn match_requirements(&self, root: &Path) -> Result<Option<TypedFinding>>;
}

/// Inspects the layout of the project as a whole.
pub trait StructureAnalyzer: Send + Sync {
    fn analyze_structure(&self, root: &Path, tree: &FileTree) -> Result<Vec<TypedFinding>>;
}
