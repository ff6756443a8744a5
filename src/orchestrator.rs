//! Review orchestration.
//!
//! Directory mode collects the file tree, runs the project-level checks and
//! the layer classifier on the calling thread, then fans one task per
//! classified file out over a fixed-size worker pool. Results are drained
//! on the calling thread in completion order. A task that fails, for any
//! reason, is logged and contributes nothing.
//!
//! Single-file mode runs the validators on one file without layer context,
//! drops architecture findings and never fails.

use crate::config::{Config, DEFAULT_WORKERS, MAX_WORKERS};
use crate::error::ReviewError;
use crate::file_tree::{FileTree, FileTreeCollector};
use crate::findings::{CodeFinding, ProjectFinding, TypedFinding};
use crate::layers::{HeuristicLayerClassifier, LayerAssignment, LayerClassifier, LlmLayerClassifier};
use crate::llm::{Completion, LLMClient};
use crate::project_checks::{
    DirectoryStructureAnalyzer, ManifestRequirementsMatcher, RequirementsMatcher, StructureAnalyzer,
};
use crate::reporter::Report;
use crate::taxonomy::{CategoryTaxonomy, ARCHITECTURE};
use crate::validators::{build_validator_set, FileContext, ValidatorSet};
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use tracing::{debug, info, info_span, warn};

/// One unit of per-file work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewTask {
    /// Relative to the review root.
    pub path: PathBuf,
    pub layer: Option<String>,
}

pub struct Reviewer {
    taxonomy: CategoryTaxonomy,
    classifier: Box<dyn LayerClassifier>,
    validators: ValidatorSet,
    requirements: Option<Box<dyn RequirementsMatcher>>,
    structure: Option<Box<dyn StructureAnalyzer>>,
    workers: usize,
    ignore_patterns: Vec<String>,
}

impl Reviewer {
    pub fn new(taxonomy: CategoryTaxonomy, classifier: Box<dyn LayerClassifier>, validators: ValidatorSet) -> Self {
        Self {
            taxonomy,
            classifier,
            validators,
            requirements: None,
            structure: None,
            workers: DEFAULT_WORKERS,
            ignore_patterns: Vec::new(),
        }
    }

    /// Wire up the shipped collaborators. With `skip_llm` the heuristic
    /// classifier replaces the LLM one and LLM validators are left out.
    pub fn from_config(config: &Config, skip_llm: bool) -> crate::Result<Self> {
        config.validate()?;

        let completion: Option<Arc<dyn Completion>> = if skip_llm {
            None
        } else {
            Some(Arc::new(LLMClient::new(config.llm.clone())?))
        };

        let classifier: Box<dyn LayerClassifier> = match &completion {
            Some(completion) => Box::new(LlmLayerClassifier::new(completion.clone(), config.layers.layer_names())),
            None => Box::new(HeuristicLayerClassifier::from_config(&config.layers)),
        };
        let validators = build_validator_set(&config.review.validators, completion)?;

        Ok(Self::new(CategoryTaxonomy::standard(), classifier, validators)
            .with_workers(config.review.workers)
            .with_ignore_patterns(config.ignore_patterns.clone())
            .with_requirements_matcher(Box::new(ManifestRequirementsMatcher::from_config(&config.requirements)))
            .with_structure_analyzer(Box::new(DirectoryStructureAnalyzer::new(
                config.structure.clone(),
                &config.extension,
            )?)))
    }

    /// Pool size, clamped to `1..=MAX_WORKERS`.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(1, MAX_WORKERS);
        self
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn with_requirements_matcher(mut self, matcher: Box<dyn RequirementsMatcher>) -> Self {
        self.requirements = Some(matcher);
        self
    }

    pub fn with_structure_analyzer(mut self, analyzer: Box<dyn StructureAnalyzer>) -> Self {
        self.structure = Some(analyzer);
        self
    }

    pub fn taxonomy(&self) -> &CategoryTaxonomy {
        &self.taxonomy
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Review a directory, or a single file when `path` is one.
    ///
    /// A directory whose only entry is a matching file is reviewed in
    /// single-file mode as well.
    pub fn review(&self, path: &Path, extension: &str) -> Result<Report, ReviewError> {
        if path.is_file() {
            return Ok(self.review_file(path));
        }
        if let Some(only) = single_matching_entry(path, extension)? {
            debug!(file = %only.display(), "directory holds a single file, reviewing it alone");
            return Ok(self.review_file(&only));
        }

        let span = info_span!("review", root = %path.display());
        let _enter = span.enter();

        let tree = FileTreeCollector::new(extension)
            .with_ignore_patterns(self.ignore_patterns.clone())
            .collect(path)?;
        info!(files = tree.file_count(), "collected files");

        let project_comments = self.project_findings(path, &tree);

        let assignment = isolate(|| {
            self.classifier
                .classify(&tree)
                .map_err(|err| ReviewError::Classification(format!("{:#}", err)))
        })
        .map_err(|err| match err {
            ReviewError::Panicked(message) => ReviewError::Classification(message),
            other => other,
        })?;

        let tasks = build_tasks(&tree, &assignment);
        info!(
            classified = tasks.len(),
            skipped = tree.file_count() - tasks.len(),
            "classified files"
        );

        let (code_comments, failed) = self.run_tasks(path, &tasks)?;
        info!(
            code_comments = code_comments.len(),
            project_comments = project_comments.len(),
            failed,
            "review finished"
        );

        Ok(Report {
            titles: self.taxonomy.titles(),
            code_comments,
            project_comments,
        })
    }

    /// Review one file without layer context. Never fails: any error yields
    /// a report with no code comments.
    pub fn review_file(&self, path: &Path) -> Report {
        let display = path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| path.to_path_buf());

        let code_comments = match isolate(|| self.review_single(path, &display)) {
            Ok(findings) => findings,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "single-file review failed");
                Vec::new()
            }
        };

        Report {
            titles: self.taxonomy.titles(),
            code_comments,
            project_comments: Vec::new(),
        }
    }

    fn review_single(&self, path: &Path, display: &Path) -> Result<Vec<CodeFinding>, ReviewError> {
        let content = fs::read_to_string(path).map_err(|source| ReviewError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let context = FileContext { path: display, layer: None };
        let display = display_path(display);

        self.validators
            .run(&content, &context)?
            .into_iter()
            .filter(|comment| comment.key != ARCHITECTURE)
            .map(|comment| CodeFinding::resolve(comment, &display, &self.taxonomy))
            .collect()
    }

    fn project_findings(&self, root: &Path, tree: &FileTree) -> Vec<ProjectFinding> {
        let mut typed: Vec<TypedFinding> = Vec::new();

        if let Some(matcher) = &self.requirements {
            let outcome = isolate(|| {
                matcher
                    .match_requirements(root)
                    .map_err(|err| project_check_error("requirements matcher", err))
            });
            match outcome {
                Ok(finding) => typed.extend(finding),
                Err(err) => warn!(source = "requirements", error = %err, "project check failed"),
            }
        }

        if let Some(analyzer) = &self.structure {
            let outcome = isolate(|| {
                analyzer
                    .analyze_structure(root, tree)
                    .map_err(|err| project_check_error("structure analyzer", err))
            });
            match outcome {
                Ok(findings) => typed.extend(findings),
                Err(err) => warn!(source = "structure", error = %err, "project check failed"),
            }
        }

        typed
            .into_iter()
            .filter_map(|finding| match ProjectFinding::resolve(finding, &self.taxonomy) {
                Ok(resolved) => Some(resolved),
                Err(err) => {
                    warn!(error = %err, "dropping project finding");
                    None
                }
            })
            .collect()
    }

    /// Fan tasks out over the pool and drain outcomes as they complete.
    /// Returns the surviving findings and the number of failed tasks.
    fn run_tasks(&self, root: &Path, tasks: &[ReviewTask]) -> Result<(Vec<CodeFinding>, usize), ReviewError> {
        if tasks.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("review-worker-{}", i))
            .build()?;

        let (sender, receiver) = mpsc::channel();
        let mut code_comments = Vec::new();
        let mut failed = 0;

        pool.in_place_scope(|scope| {
            for task in tasks {
                let sender = sender.clone();
                scope.spawn(move |_| {
                    let outcome = isolate(|| self.review_task(root, task));
                    // The receiver outlives every task in this scope.
                    let _ = sender.send((task, outcome));
                });
            }
            drop(sender);

            for (task, outcome) in receiver {
                match outcome {
                    Ok(findings) => {
                        debug!(file = %task.path.display(), findings = findings.len(), "file reviewed");
                        code_comments.extend(findings);
                    }
                    Err(err) => {
                        failed += 1;
                        warn!(
                            file = %task.path.display(),
                            layer = task.layer.as_deref().unwrap_or("-"),
                            error = %err,
                            "review task failed, file contributes no findings"
                        );
                    }
                }
            }
        });

        Ok((code_comments, failed))
    }

    fn review_task(&self, root: &Path, task: &ReviewTask) -> Result<Vec<CodeFinding>, ReviewError> {
        let full_path = root.join(&task.path);
        let content = fs::read_to_string(&full_path).map_err(|source| ReviewError::ReadFile {
            path: full_path.clone(),
            source,
        })?;

        let context = FileContext {
            path: &task.path,
            layer: task.layer.as_deref(),
        };
        let display = display_path(&task.path);

        self.validators
            .run(&content, &context)?
            .into_iter()
            .map(|comment| CodeFinding::resolve(comment, &display, &self.taxonomy))
            .collect()
    }
}

/// One task per file that the classifier assigned a layer to, in tree order.
pub fn build_tasks(tree: &FileTree, assignment: &LayerAssignment) -> Vec<ReviewTask> {
    let classified = tree.retain_files(|path| assignment.contains(path));
    classified
        .files()
        .map(|path| ReviewTask {
            layer: assignment.layer_of(&path).map(str::to_string),
            path,
        })
        .collect()
}

/// The directory's only entry, when it is a file with the reviewed extension.
fn single_matching_entry(root: &Path, extension: &str) -> Result<Option<PathBuf>, ReviewError> {
    let tree_error = |source: std::io::Error| ReviewError::TreeCollection {
        root: root.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(root).map_err(tree_error)?;
    let Some(first) = entries.next() else {
        return Ok(None);
    };
    if entries.next().is_some() {
        return Ok(None);
    }

    let entry = first.map_err(tree_error)?;
    let is_file = entry.file_type().map_err(tree_error)?.is_file();
    let collector = FileTreeCollector::new(extension);
    if is_file && collector.matches(&entry.file_name().to_string_lossy()) {
        Ok(Some(entry.path()))
    } else {
        Ok(None)
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn project_check_error(check: &str, err: anyhow::Error) -> ReviewError {
    ReviewError::ProjectCheck {
        check: check.to_string(),
        message: format!("{:#}", err),
    }
}

/// Run `work`, turning a panic into `ReviewError::Panicked`.
fn isolate<T>(work: impl FnOnce() -> Result<T, ReviewError>) -> Result<T, ReviewError> {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(result) => result,
        Err(payload) => Err(ReviewError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
