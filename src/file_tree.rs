use crate::error::ReviewError;
use ignore::WalkBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files discovered under a review root, grouped by their directory
/// relative to the root. The root itself is the empty path.
///
/// Directories without a matching file are never present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTree {
    directories: BTreeMap<PathBuf, Vec<String>>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add files to a directory; an empty list leaves the tree untouched.
    pub fn insert(&mut self, directory: impl Into<PathBuf>, files: Vec<String>) {
        if files.is_empty() {
            return;
        }
        self.directories
            .entry(directory.into())
            .or_default()
            .extend(files);
    }

    pub fn directories(&self) -> impl Iterator<Item = &Path> {
        self.directories.keys().map(PathBuf::as_path)
    }

    pub fn files_in(&self, directory: &Path) -> &[String] {
        self.directories
            .get(directory)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains_directory(&self, directory: &Path) -> bool {
        self.directories.contains_key(directory)
    }

    /// Every file as a path relative to the root, directory by directory.
    pub fn files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.directories
            .iter()
            .flat_map(|(dir, names)| names.iter().map(move |name| dir.join(name)))
    }

    pub fn file_count(&self) -> usize {
        self.directories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    /// A new tree holding only the files accepted by `keep`.
    pub fn retain_files(&self, mut keep: impl FnMut(&Path) -> bool) -> FileTree {
        let mut tree = FileTree::new();
        for (dir, names) in &self.directories {
            let kept = names
                .iter()
                .filter(|name| keep(&dir.join(name)))
                .cloned()
                .collect();
            tree.insert(dir.clone(), kept);
        }
        tree
    }

    /// Plain listing used in prompts: one `dir/: a, b` line per directory.
    pub fn listing(&self) -> String {
        self.directories
            .iter()
            .map(|(dir, names)| format!("{}/: {}", display_dir(dir), names.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `.` for the root, the relative path otherwise.
pub fn display_dir(dir: &Path) -> String {
    if dir.as_os_str().is_empty() {
        ".".to_string()
    } else {
        dir.to_string_lossy().replace('\\', "/")
    }
}

pub struct FileTreeCollector {
    extension: String,
    ignore_patterns: Vec<String>,
}

impl FileTreeCollector {
    /// `extension` may be given with or without its leading dot.
    pub fn new(extension: &str) -> Self {
        Self {
            extension: normalize_extension(extension),
            ignore_patterns: Vec::new(),
        }
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.len() > self.extension.len() && file_name.ends_with(&self.extension)
    }

    pub fn collect(&self, root: &Path) -> Result<FileTree, ReviewError> {
        let tree_error = |source: io::Error| ReviewError::TreeCollection {
            root: root.to_path_buf(),
            source,
        };

        // Only the root is fatal; unreadable entries below it are skipped.
        fs::read_dir(root).map_err(tree_error)?;

        let patterns = self.ignore_patterns.clone();
        let walker = WalkBuilder::new(root)
            .standard_filters(true)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                entry.depth() == 0 || !is_ignored(&entry.file_name().to_string_lossy(), &patterns)
            })
            .build();

        let mut grouped: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
        for result in walker {
            let Some(entry) = readable_entry(result) else {
                continue;
            };
            // Follows symlinks, so linked files are collected too.
            if !entry.path().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            if !self.matches(&file_name) {
                continue;
            }

            let relative_dir = entry
                .path()
                .parent()
                .and_then(|parent| parent.strip_prefix(root).ok())
                .map(Path::to_path_buf)
                .unwrap_or_default();
            grouped.entry(relative_dir).or_default().push(file_name);
        }

        let mut tree = FileTree::new();
        for (dir, files) in grouped {
            tree.insert(dir, files);
        }
        tracing::debug!(
            root = %root.display(),
            directories = tree.directories.len(),
            files = tree.file_count(),
            "collected file tree"
        );
        Ok(tree)
    }
}

pub fn normalize_extension(extension: &str) -> String {
    format!(".{}", extension.trim_start_matches('.'))
}

fn readable_entry<T>(result: Result<T, ignore::Error>) -> Option<T> {
    match result {
        Ok(entry) => Some(entry),
        Err(err) => {
            tracing::warn!(error = %err, "skipping unreadable entry");
            None
        }
    }
}

/// Exact names match any path component; `*.ext` and other `*` globs match
/// the file name.
fn is_ignored(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        if let Some(ext) = pattern.strip_prefix("*.") {
            name.ends_with(&format!(".{}", ext))
        } else if pattern.contains('*') {
            let regex_pattern = format!("^{}$", regex::escape(pattern).replace(r"\*", ".*"));
            Regex::new(&regex_pattern)
                .map(|re| re.is_match(name))
                .unwrap_or(false)
        } else {
            name == pattern
        }
    })
}
