use super::StructureAnalyzer;
use crate::config::StructureConfig;
use crate::file_tree::{display_dir, normalize_extension, FileTree};
use crate::findings::TypedFinding;
use crate::taxonomy::STRUCTURE;
use anyhow::Result;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportStyle {
    Python,
    Rust,
    JavaScript,
}

impl ImportStyle {
    fn for_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.') {
            "py" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "js" | "jsx" | "mjs" | "ts" | "tsx" => Some(Self::JavaScript),
            _ => None,
        }
    }
}

/// Structural checks over the whole tree: nesting depth, required
/// directories and import cycles between directories.
pub struct DirectoryStructureAnalyzer {
    config: StructureConfig,
    style: Option<ImportStyle>,
    import_patterns: Vec<Regex>,
}

impl DirectoryStructureAnalyzer {
    pub fn new(config: StructureConfig, extension: &str) -> Result<Self> {
        let extension = normalize_extension(extension);
        let style = ImportStyle::for_extension(&extension);
        let import_patterns = match style {
            Some(ImportStyle::Python) => vec![
                Regex::new(r"^\s*from\s+(\.*[\w\.]*)\s+import\b")?,
                Regex::new(r"^\s*import\s+([\w\.]+)")?,
            ],
            Some(ImportStyle::Rust) => vec![Regex::new(r"^\s*(?:pub\s+)?use\s+crate::([\w:]+)")?],
            Some(ImportStyle::JavaScript) => vec![
                Regex::new(r#"^\s*import\s+.*?\s+from\s+['"](\.{1,2}/[^'"]+)['"]"#)?,
                Regex::new(r#"require\s*\(\s*['"](\.{1,2}/[^'"]+)['"]"#)?,
            ],
            None => Vec::new(),
        };
        Ok(Self {
            config,
            style,
            import_patterns,
        })
    }

    fn depth_findings(&self, tree: &FileTree) -> Vec<TypedFinding> {
        tree.directories()
            .filter(|dir| dir.components().count() > self.config.max_depth)
            .map(|dir| {
                TypedFinding::new(
                    STRUCTURE,
                    format!(
                        "Directory `{}` is nested {} levels deep (limit {})",
                        display_dir(dir),
                        dir.components().count(),
                        self.config.max_depth
                    ),
                )
            })
            .collect()
    }

    fn required_directory_findings(&self, root: &Path) -> Vec<TypedFinding> {
        self.config
            .required_directories
            .iter()
            .filter(|dir| !root.join(dir).is_dir())
            .map(|dir| TypedFinding::new(STRUCTURE, format!("Required directory `{}` is missing", dir)))
            .collect()
    }

    fn cycle_findings(&self, root: &Path, tree: &FileTree) -> Vec<TypedFinding> {
        let Some(style) = self.style else {
            return Vec::new();
        };

        let mut graph: DiGraph<PathBuf, ()> = DiGraph::new();
        let mut nodes: HashMap<PathBuf, NodeIndex> = HashMap::new();
        for dir in tree.directories() {
            nodes.insert(dir.to_path_buf(), graph.add_node(dir.to_path_buf()));
        }

        for dir in tree.directories() {
            for name in tree.files_in(dir) {
                let path = root.join(dir).join(name);
                let content = match fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(err) => {
                        tracing::debug!(file = %path.display(), error = %err, "skipping file in import scan");
                        continue;
                    }
                };
                for module in self.imports_in(&content) {
                    let Some(target) = resolve_import(tree, dir, &module, style) else {
                        continue;
                    };
                    if target == dir {
                        continue;
                    }
                    let (from, to) = (nodes[dir], nodes[&target]);
                    if graph.find_edge(from, to).is_none() {
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut dirs: Vec<String> = component.iter().map(|idx| display_dir(&graph[*idx])).collect();
                dirs.sort();
                dirs
            })
            .collect();
        cycles.sort();

        cycles
            .into_iter()
            .map(|dirs| {
                TypedFinding::new(
                    STRUCTURE,
                    format!("Directories import each other in a cycle: {}", dirs.join(" <-> ")),
                )
            })
            .collect()
    }

    fn imports_in(&self, content: &str) -> Vec<String> {
        content
            .lines()
            .flat_map(|line| {
                self.import_patterns
                    .iter()
                    .filter_map(move |re| re.captures(line))
                    .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            })
            .collect()
    }
}

impl StructureAnalyzer for DirectoryStructureAnalyzer {
    fn analyze_structure(&self, root: &Path, tree: &FileTree) -> Result<Vec<TypedFinding>> {
        let mut findings = self.depth_findings(tree);
        findings.extend(self.required_directory_findings(root));
        if self.config.detect_import_cycles {
            findings.extend(self.cycle_findings(root, tree));
        }
        Ok(findings)
    }
}

/// The tree directory an import refers to, if it refers to one.
fn resolve_import(tree: &FileTree, from_dir: &Path, module: &str, style: ImportStyle) -> Option<PathBuf> {
    let candidates: Vec<PathBuf> = match style {
        ImportStyle::Python => {
            let dots = module.chars().take_while(|c| *c == '.').count();
            let rest: Vec<&str> = module[dots..].split('.').filter(|s| !s.is_empty()).collect();
            let bases = if dots > 0 {
                let mut base = from_dir.to_path_buf();
                for _ in 1..dots {
                    base = base.parent()?.to_path_buf();
                }
                vec![base]
            } else {
                vec![PathBuf::new(), PathBuf::from("src")]
            };
            bases
                .iter()
                .flat_map(|base| prefixes(base, &rest))
                .collect()
        }
        ImportStyle::Rust => {
            let rest: Vec<&str> = module.split("::").filter(|s| !s.is_empty()).collect();
            prefixes(Path::new("src"), &rest)
        }
        ImportStyle::JavaScript => {
            let joined = normalize(&from_dir.join(module))?;
            let parent = joined.parent().map(Path::to_path_buf);
            std::iter::once(joined).chain(parent).collect()
        }
    };

    candidates
        .into_iter()
        .find(|candidate| !candidate.as_os_str().is_empty() && tree.contains_directory(candidate))
}

/// `base/a/b/c`, `base/a/b`, `base/a`, longest first.
fn prefixes(base: &Path, segments: &[&str]) -> Vec<PathBuf> {
    (1..=segments.len())
        .rev()
        .map(|len| segments[..len].iter().fold(base.to_path_buf(), |path, s| path.join(s)))
        .collect()
}

/// Resolve `.` and `..` lexically; `None` when the path leaves the root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
            _ => return None,
        }
    }
    Some(out)
}
