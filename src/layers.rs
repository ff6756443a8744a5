//! Architectural layer classification.
//!
//! A classifier sees the whole file tree once per review and returns a
//! layer for some subset of its files. Files left out are not reviewed.

use crate::config::{LayerRule, LayersConfig};
use crate::file_tree::{display_dir, FileTree};
use crate::llm::{extract_json, Completion};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File path (relative to the review root) to layer label. At most one
/// layer per file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerAssignment {
    layers: BTreeMap<PathBuf, String>,
}

impl LayerAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `layer` to `path`, replacing any earlier assignment.
    pub fn assign(&mut self, path: impl Into<PathBuf>, layer: impl Into<String>) {
        self.layers.insert(path.into(), layer.into());
    }

    pub fn layer_of(&self, path: &Path) -> Option<&str> {
        self.layers.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.layers.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

pub trait LayerClassifier: Send + Sync {
    fn classify(&self, tree: &FileTree) -> Result<LayerAssignment>;
}

/// Deterministic classifier: a directory takes the layer of the first rule
/// with a keyword equal to one of its path components, checked from the
/// innermost component outwards.
pub struct HeuristicLayerClassifier {
    rules: Vec<LayerRule>,
}

impl HeuristicLayerClassifier {
    pub fn new(rules: Vec<LayerRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &LayersConfig) -> Self {
        Self::new(config.rules.clone())
    }

    fn layer_for_directory(&self, dir: &Path) -> Option<&str> {
        let components: Vec<String> = dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
            .collect();

        components.iter().rev().find_map(|component| {
            self.rules
                .iter()
                .find(|rule| rule.keywords.iter().any(|k| k.eq_ignore_ascii_case(component)))
                .map(|rule| rule.layer.as_str())
        })
    }
}

impl LayerClassifier for HeuristicLayerClassifier {
    fn classify(&self, tree: &FileTree) -> Result<LayerAssignment> {
        let mut assignment = LayerAssignment::new();
        for dir in tree.directories() {
            let Some(layer) = self.layer_for_directory(dir) else {
                continue;
            };
            for name in tree.files_in(dir) {
                assignment.assign(dir.join(name), layer);
            }
        }
        Ok(assignment)
    }
}

const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a software architect. You classify the directories of a project into architectural layers.";

/// Asks the reasoning service for a `directory -> layer` mapping and
/// spreads each directory's layer over its files.
pub struct LlmLayerClassifier {
    completion: Arc<dyn Completion>,
    layers: Vec<String>,
}

impl LlmLayerClassifier {
    pub fn new(completion: Arc<dyn Completion>, layers: Vec<String>) -> Self {
        Self { completion, layers }
    }

    fn build_prompt(&self, tree: &FileTree) -> String {
        format!(
            "Project files, one directory per line:\n{}\n\n\
             Allowed layers: {}.\n\
             Answer with a JSON object mapping each directory exactly as written above \
             (use \".\" for the project root) to one allowed layer. \
             Leave out directories that hold no application code or that you cannot classify confidently.",
            tree.listing(),
            self.layers.join(", ")
        )
    }
}

impl LayerClassifier for LlmLayerClassifier {
    fn classify(&self, tree: &FileTree) -> Result<LayerAssignment> {
        if tree.is_empty() {
            return Ok(LayerAssignment::new());
        }

        let answer = self
            .completion
            .complete(CLASSIFIER_SYSTEM_PROMPT, &self.build_prompt(tree))?;
        let by_directory: HashMap<String, String> = serde_json::from_str(extract_json(&answer))
            .context("layer classifier answer is not a directory-to-layer object")?;

        let mut assignment = LayerAssignment::new();
        for dir in tree.directories() {
            let key = display_dir(dir);
            let layer = by_directory
                .get(&key)
                .or_else(|| by_directory.get(&format!("{}/", key)));
            match layer {
                Some(layer) if self.layers.is_empty() || self.layers.contains(layer) => {
                    for name in tree.files_in(dir) {
                        assignment.assign(dir.join(name), layer.clone());
                    }
                }
                Some(layer) => {
                    tracing::debug!(directory = %key, layer = %layer, "ignoring unknown layer from classifier");
                }
                None => {}
            }
        }
        Ok(assignment)
    }
}
