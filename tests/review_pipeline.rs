use anyhow::{anyhow, bail, Result};
use layer_review::findings::{RawComment, TypedFinding, ValidatorResult};
use layer_review::project_checks::{RequirementsMatcher, StructureAnalyzer};
use layer_review::taxonomy::{ARCHITECTURE, DEPENDENCIES, LOGGING, STRUCTURE};
use layer_review::{
    CategoryTaxonomy, FileContext, FileTree, LayerAssignment, LayerClassifier, ReviewError, Reviewer, Validator,
    ValidatorSet,
};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

/// Assigns `layer` to every file in the tree.
struct EveryFile {
    layer: &'static str,
    seen: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl EveryFile {
    fn new(layer: &'static str) -> Self {
        Self {
            layer,
            seen: Arc::new(AtomicUsize::new(usize::MAX)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl LayerClassifier for EveryFile {
    fn classify(&self, tree: &FileTree) -> Result<LayerAssignment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.store(tree.file_count(), Ordering::SeqCst);
        let mut assignment = LayerAssignment::new();
        for path in tree.files() {
            assignment.assign(path, self.layer);
        }
        Ok(assignment)
    }
}

/// Assigns a layer only to the listed files.
struct Only(Vec<&'static str>);

impl LayerClassifier for Only {
    fn classify(&self, _tree: &FileTree) -> Result<LayerAssignment> {
        let mut assignment = LayerAssignment::new();
        for path in &self.0 {
            assignment.assign(*path, "domain");
        }
        Ok(assignment)
    }
}

struct BrokenClassifier;

impl LayerClassifier for BrokenClassifier {
    fn classify(&self, _tree: &FileTree) -> Result<LayerAssignment> {
        Err(anyhow!("model unavailable"))
    }
}

/// Scripted by file content: `ok` yields one logging comment on line 3,
/// `fail` errors, `panic` panics, `arch` yields an architecture comment,
/// `bogus` yields a comment with an unregistered key, anything else nothing.
struct Scripted;

impl Validator for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn analyze(&self, content: &str, _context: Option<&FileContext<'_>>) -> Result<ValidatorResult> {
        let comments = match content.trim() {
            "ok" => vec![RawComment::new(LOGGING, 3, 3, "use the logger")],
            "fail" => bail!("validator raised"),
            "panic" => panic!("validator blew up"),
            "arch" => vec![
                RawComment::at_line(ARCHITECTURE, 1, "crosses a layer boundary"),
                RawComment::at_line(LOGGING, 2, "print call"),
            ],
            "bogus" => vec![RawComment::at_line("no-such-category", 1, "mystery")],
            _ => Vec::new(),
        };
        Ok(ValidatorResult::from_comments(comments))
    }
}

/// Records the context it was given.
struct ContextRecorder {
    wants_context: bool,
    layers: Arc<std::sync::Mutex<Vec<Option<String>>>>,
}

impl Validator for ContextRecorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn needs_file_context(&self) -> bool {
        self.wants_context
    }

    fn analyze(&self, _content: &str, context: Option<&FileContext<'_>>) -> Result<ValidatorResult> {
        let layer = context.and_then(|c| c.layer).map(str::to_string);
        if let Ok(mut layers) = self.layers.lock() {
            layers.push(layer);
        }
        Ok(ValidatorResult::empty())
    }
}

struct FixedRequirements(Option<&'static str>);

impl RequirementsMatcher for FixedRequirements {
    fn match_requirements(&self, _root: &Path) -> Result<Option<TypedFinding>> {
        Ok(self.0.map(|message| TypedFinding::new(DEPENDENCIES, message)))
    }
}

struct BrokenRequirements;

impl RequirementsMatcher for BrokenRequirements {
    fn match_requirements(&self, _root: &Path) -> Result<Option<TypedFinding>> {
        bail!("manifest unreadable")
    }
}

struct FixedStructure(Vec<&'static str>);

impl StructureAnalyzer for FixedStructure {
    fn analyze_structure(&self, _root: &Path, _tree: &FileTree) -> Result<Vec<TypedFinding>> {
        Ok(self.0.iter().map(|m| TypedFinding::new(STRUCTURE, *m)).collect())
    }
}

struct PanickingStructure;

impl StructureAnalyzer for PanickingStructure {
    fn analyze_structure(&self, _root: &Path, _tree: &FileTree) -> Result<Vec<TypedFinding>> {
        panic!("structure analyzer blew up")
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn reviewer(classifier: impl LayerClassifier + 'static) -> Reviewer {
    Reviewer::new(
        CategoryTaxonomy::standard(),
        Box::new(classifier),
        ValidatorSet::new().with(Scripted),
    )
}

fn standard_titles() -> Vec<String> {
    CategoryTaxonomy::standard().titles()
}

#[test]
fn test_failing_file_is_isolated() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.py", "ok");
    write(dir.path(), "b.py", "fail");

    let report = reviewer(EveryFile::new("domain")).review(dir.path(), ".py").unwrap();

    assert_eq!(report.titles, standard_titles());
    assert_eq!(report.code_comments.len(), 1);
    let finding = &report.code_comments[0];
    assert_eq!(finding.path, "a.py");
    assert_eq!(finding.title, "Logging");
    assert_eq!((finding.start_line, finding.end_line), (3, 3));
    assert!(report.comments_for_file("b.py").next().is_none());
}

#[test]
fn test_panicking_validator_is_isolated() {
    let dir = tempdir().unwrap();
    for i in 0..6 {
        write(dir.path(), &format!("pkg/ok_{}.py", i), "ok");
    }
    write(dir.path(), "pkg/boom.py", "panic");

    let report = reviewer(EveryFile::new("domain"))
        .with_workers(3)
        .review(dir.path(), "py")
        .unwrap();

    assert_eq!(report.code_comments.len(), 6);
    assert!(report.code_comments.iter().all(|c| c.path.starts_with("pkg/ok_")));
}

#[test]
fn test_unknown_category_fails_only_that_file() {
    let dir = tempdir().unwrap();
    write(dir.path(), "good.py", "ok");
    write(dir.path(), "odd.py", "bogus");

    let report = reviewer(EveryFile::new("domain")).review(dir.path(), ".py").unwrap();
    let paths: Vec<&str> = report.code_comments.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["good.py"]);
}

#[test]
fn test_unclassified_files_are_not_reviewed() {
    let dir = tempdir().unwrap();
    write(dir.path(), "core/model.py", "ok");
    write(dir.path(), "scripts/tool.py", "ok");

    let report = reviewer(Only(vec!["core/model.py"])).review(dir.path(), ".py").unwrap();
    assert_eq!(report.code_comments.len(), 1);
    assert_eq!(report.code_comments[0].path, "core/model.py");
}

#[test]
fn test_lines_are_one_based_and_ordered() {
    let dir = tempdir().unwrap();
    for i in 0..4 {
        write(dir.path(), &format!("m{}.py", i), "arch");
    }
    let report = reviewer(EveryFile::new("domain")).review(dir.path(), ".py").unwrap();

    assert_eq!(report.code_comments.len(), 8);
    for comment in &report.code_comments {
        assert!(comment.start_line >= 1);
        assert!(comment.start_line <= comment.end_line);
        assert!(report.titles.contains(&comment.title));
    }
}

#[test]
fn test_single_file_directory_drops_architecture_findings() {
    let dir = tempdir().unwrap();
    write(dir.path(), "only.py", "arch");

    // The classifier is never consulted in single-file mode.
    let report = reviewer(BrokenClassifier).review(dir.path(), ".py").unwrap();

    assert_eq!(report.titles, standard_titles());
    assert_eq!(report.code_comments.len(), 1);
    assert_eq!(report.code_comments[0].title, "Logging");
    assert_eq!(report.code_comments[0].path, "only.py");
    assert!(report.project_comments.is_empty());
}

#[test]
fn test_file_path_runs_single_file_mode() {
    let dir = tempdir().unwrap();
    write(dir.path(), "src/service.py", "arch");
    write(dir.path(), "src/other.py", "ok");

    let report = reviewer(BrokenClassifier)
        .review(&dir.path().join("src/service.py"), ".py")
        .unwrap();
    let titles: Vec<&str> = report.code_comments.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Logging"]);
    assert_eq!(report.code_comments[0].path, "service.py");
}

#[test]
fn test_single_file_mode_never_fails() {
    let dir = tempdir().unwrap();
    write(dir.path(), "broken.py", "panic");
    let report = reviewer(EveryFile::new("domain")).review_file(&dir.path().join("broken.py"));
    assert!(report.code_comments.is_empty());
    assert_eq!(report.titles, standard_titles());

    let missing = reviewer(EveryFile::new("domain")).review_file(&dir.path().join("missing.py"));
    assert!(missing.code_comments.is_empty());
}

#[test]
fn test_single_file_mode_passes_no_layer() {
    let dir = tempdir().unwrap();
    write(dir.path(), "one.py", "x = 1");
    let layers = Arc::new(std::sync::Mutex::new(Vec::new()));
    let validators = ValidatorSet::new().with(ContextRecorder {
        wants_context: true,
        layers: layers.clone(),
    });

    let reviewer = Reviewer::new(CategoryTaxonomy::standard(), Box::new(EveryFile::new("domain")), validators);
    reviewer.review(dir.path(), ".py").unwrap();
    assert_eq!(*layers.lock().unwrap(), vec![None]);
}

#[test]
fn test_context_goes_only_to_validators_that_ask() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/x.py", "");
    write(dir.path(), "b/y.py", "");
    let with_context = Arc::new(std::sync::Mutex::new(Vec::new()));
    let without_context = Arc::new(std::sync::Mutex::new(Vec::new()));
    let validators = ValidatorSet::new()
        .with(ContextRecorder {
            wants_context: true,
            layers: with_context.clone(),
        })
        .with(ContextRecorder {
            wants_context: false,
            layers: without_context.clone(),
        });

    let reviewer = Reviewer::new(CategoryTaxonomy::standard(), Box::new(EveryFile::new("data")), validators);
    reviewer.review(dir.path(), ".py").unwrap();

    assert_eq!(*with_context.lock().unwrap(), vec![Some("data".to_string()); 2]);
    assert_eq!(*without_context.lock().unwrap(), vec![None, None]);
}

#[test]
fn test_empty_tree_still_reports_project_findings() {
    let dir = tempdir().unwrap();
    write(dir.path(), "README.md", "docs");
    write(dir.path(), "notes.txt", "more docs");

    let classifier = EveryFile::new("domain");
    let seen = classifier.seen.clone();
    let report = reviewer(classifier)
        .with_requirements_matcher(Box::new(FixedRequirements(Some("requests is forbidden"))))
        .with_structure_analyzer(Box::new(FixedStructure(vec!["Required directory `tests` is missing"])))
        .review(dir.path(), ".py")
        .unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(report.titles, standard_titles());
    assert!(report.code_comments.is_empty());
    let project: Vec<(&str, &str)> = report
        .project_comments
        .iter()
        .map(|c| (c.title.as_str(), c.message.as_str()))
        .collect();
    assert_eq!(
        project,
        vec![
            ("Forbidden dependencies", "requests is forbidden"),
            ("Project structure", "Required directory `tests` is missing"),
        ]
    );
}

#[test]
fn test_failing_project_checks_are_degraded() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.py", "ok");
    write(dir.path(), "b.py", "");

    let report = reviewer(EveryFile::new("domain"))
        .with_requirements_matcher(Box::new(BrokenRequirements))
        .with_structure_analyzer(Box::new(PanickingStructure))
        .review(dir.path(), ".py")
        .unwrap();

    assert!(report.project_comments.is_empty());
    assert_eq!(report.code_comments.len(), 1);
}

#[test]
fn test_no_requirements_finding_is_fine() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.py", "");
    write(dir.path(), "b.py", "");

    let report = reviewer(EveryFile::new("domain"))
        .with_requirements_matcher(Box::new(FixedRequirements(None)))
        .review(dir.path(), ".py")
        .unwrap();
    assert!(report.is_clean());
}

#[test]
fn test_classifier_failure_is_fatal() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.py", "ok");
    write(dir.path(), "b.py", "ok");

    let err = reviewer(BrokenClassifier).review(dir.path(), ".py").unwrap_err();
    assert!(matches!(err, ReviewError::Classification(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_missing_root_is_fatal() {
    let dir = tempdir().unwrap();
    let err = reviewer(EveryFile::new("domain"))
        .review(&dir.path().join("does-not-exist"), ".py")
        .unwrap_err();
    assert!(matches!(err, ReviewError::TreeCollection { .. }));
}

#[test]
fn test_custom_taxonomy_titles_flow_into_report() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.py", "ok");
    write(dir.path(), "b.py", "");

    let taxonomy = CategoryTaxonomy::new().with_category(LOGGING, "Logging hygiene");
    let reviewer = Reviewer::new(taxonomy, Box::new(EveryFile::new("domain")), ValidatorSet::new().with(Scripted));
    let report = reviewer.review(dir.path(), ".py").unwrap();

    assert_eq!(report.titles, vec!["Logging hygiene".to_string()]);
    assert_eq!(report.code_comments[0].title, "Logging hygiene");
}

#[test]
fn test_classifier_runs_once_per_directory_review() {
    let dir = tempdir().unwrap();
    for i in 0..5 {
        write(dir.path(), &format!("svc/m{}.py", i), "ok");
    }
    write(dir.path(), "api/routes.py", "ok");

    let classifier = EveryFile::new("domain");
    let calls = classifier.calls.clone();
    let report = reviewer(classifier).with_workers(2).review(dir.path(), ".py").unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.code_comments.len(), 6);
}

#[test]
fn test_single_file_mode_skips_classifier() {
    let dir = tempdir().unwrap();
    write(dir.path(), "only.py", "ok");

    let classifier = EveryFile::new("domain");
    let calls = classifier.calls.clone();
    reviewer(classifier).review(dir.path(), ".py").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_lone_subdirectory_stays_in_directory_mode() {
    let dir = tempdir().unwrap();
    write(dir.path(), "pkg/only.py", "arch");

    let classifier = EveryFile::new("domain");
    let calls = classifier.calls.clone();
    let report = reviewer(classifier)
        .with_structure_analyzer(Box::new(FixedStructure(vec!["too shallow"])))
        .review(dir.path(), ".py")
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let titles: Vec<&str> = report.code_comments.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Architecture violations", "Logging"]);
    assert_eq!(report.code_comments[0].path, "pkg/only.py");
    assert_eq!(report.project_comments.len(), 1);
}

#[test]
fn test_lone_non_matching_file_stays_in_directory_mode() {
    let dir = tempdir().unwrap();
    write(dir.path(), "README.md", "arch");

    let classifier = EveryFile::new("domain");
    let calls = classifier.calls.clone();
    let report = reviewer(classifier)
        .with_requirements_matcher(Box::new(FixedRequirements(Some("requests is forbidden"))))
        .review(dir.path(), ".py")
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(report.code_comments.is_empty());
    assert_eq!(report.project_comments.len(), 1);
    assert_eq!(report.project_comments[0].title, "Forbidden dependencies");
}
