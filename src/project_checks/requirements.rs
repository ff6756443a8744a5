use super::RequirementsMatcher;
use crate::config::RequirementsConfig;
use crate::findings::TypedFinding;
use crate::taxonomy::DEPENDENCIES;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Reads the dependency manifests found in the project root and reports
/// every declared dependency that is on the forbidden list.
pub struct ManifestRequirementsMatcher {
    manifests: Vec<String>,
    forbidden: BTreeSet<String>,
}

impl ManifestRequirementsMatcher {
    pub fn new(manifests: Vec<String>, forbidden: Vec<String>) -> Self {
        Self {
            manifests,
            forbidden: forbidden.iter().map(|d| normalize_name(d)).collect(),
        }
    }

    pub fn from_config(config: &RequirementsConfig) -> Self {
        Self::new(config.manifests.clone(), config.forbidden.clone())
    }

    fn declared_in(manifest: &str, content: &str) -> Result<Vec<String>> {
        let names = match manifest {
            "package.json" => package_json_dependencies(content)?,
            "Cargo.toml" => cargo_dependencies(content)?,
            "pyproject.toml" => pyproject_dependencies(content)?,
            _ => requirements_txt_dependencies(content),
        };
        Ok(names)
    }
}

impl RequirementsMatcher for ManifestRequirementsMatcher {
    fn match_requirements(&self, root: &Path) -> Result<Option<TypedFinding>> {
        if self.forbidden.is_empty() {
            return Ok(None);
        }

        let mut hits = Vec::new();
        for manifest in &self.manifests {
            let path = root.join(manifest);
            if !path.is_file() {
                continue;
            }
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| manifest.clone());
            let declared = Self::declared_in(&file_name, &content)
                .with_context(|| format!("failed to parse {}", path.display()))?;

            for name in declared {
                if self.forbidden.contains(&normalize_name(&name)) {
                    hits.push(format!("{} ({})", name, manifest));
                }
            }
        }

        if hits.is_empty() {
            return Ok(None);
        }
        Ok(Some(TypedFinding::new(
            DEPENDENCIES,
            format!("Forbidden dependencies are declared: {}", hits.join(", ")),
        )))
    }
}

/// Package names compare case-insensitively, with `_` and `.` equal to `-`.
fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(['_', '.'], "-")
}

/// Name part of a requirement specifier such as `requests[socks]>=2.0; python_version>"3"`.
fn requirement_name(spec: &str) -> Option<String> {
    let spec = spec.trim();
    if spec.is_empty() || spec.starts_with('#') || spec.starts_with('-') {
        return None;
    }
    let end = spec
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .unwrap_or(spec.len());
    let name = &spec[..end];
    (!name.is_empty()).then(|| name.to_string())
}

fn requirements_txt_dependencies(content: &str) -> Vec<String> {
    content.lines().filter_map(requirement_name).collect()
}

fn pyproject_dependencies(content: &str) -> Result<Vec<String>> {
    let doc: toml::Value = toml::from_str(content)?;
    let mut names = Vec::new();

    if let Some(deps) = doc.get("project").and_then(|p| p.get("dependencies")).and_then(|d| d.as_array()) {
        names.extend(deps.iter().filter_map(|d| d.as_str()).filter_map(requirement_name));
    }
    if let Some(deps) = doc
        .get("tool")
        .and_then(|t| t.get("poetry"))
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_table())
    {
        names.extend(deps.keys().filter(|k| k.as_str() != "python").cloned());
    }
    Ok(names)
}

fn cargo_dependencies(content: &str) -> Result<Vec<String>> {
    let doc: toml::Value = toml::from_str(content)?;
    let names = ["dependencies", "dev-dependencies", "build-dependencies"]
        .iter()
        .filter_map(|section| doc.get(section).and_then(|d| d.as_table()))
        .flat_map(|table| table.keys().cloned())
        .collect();
    Ok(names)
}

fn package_json_dependencies(content: &str) -> Result<Vec<String>> {
    let doc: serde_json::Value = serde_json::from_str(content)?;
    let names = ["dependencies", "devDependencies"]
        .iter()
        .filter_map(|section| doc.get(section).and_then(|d| d.as_object()))
        .flat_map(|deps| deps.keys().cloned())
        .collect();
    Ok(names)
}
