//! Category taxonomy: the fixed, ordered registry of finding types.
//!
//! Every key a validator or project check can emit must be registered here.
//! The declared order is the order of `Report::titles`.

use crate::error::ReviewError;
use serde::{Deserialize, Serialize};

/// Layer/architecture mismatches. Suppressed in single-file reviews.
pub const ARCHITECTURE: &str = "architecture";
pub const LOGGING: &str = "logging";
pub const DEPENDENCIES: &str = "dependencies";
pub const STRUCTURE: &str = "structure";
pub const REVIEW: &str = "review";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Category {
    key: String,
    title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTaxonomy {
    categories: Vec<Category>,
}

impl CategoryTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The categories every shipped validator and project check emits into.
    pub fn standard() -> Self {
        Self::new()
            .with_category(ARCHITECTURE, "Architecture violations")
            .with_category(LOGGING, "Logging")
            .with_category(DEPENDENCIES, "Forbidden dependencies")
            .with_category(STRUCTURE, "Project structure")
            .with_category(REVIEW, "Code review")
    }

    /// Register a category. Re-registering a key replaces its title in place.
    pub fn with_category(mut self, key: &str, title: &str) -> Self {
        match self.categories.iter_mut().find(|c| c.key == key) {
            Some(existing) => existing.title = title.to_string(),
            None => self.categories.push(Category {
                key: key.to_string(),
                title: title.to_string(),
            }),
        }
        self
    }

    pub fn resolve(&self, key: &str) -> Result<&str, ReviewError> {
        self.title_of(key)
            .ok_or_else(|| ReviewError::UnknownCategory(key.to_string()))
    }

    pub fn title_of(&self, key: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.title.as_str())
    }

    /// All titles in declared order.
    pub fn titles(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.title.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
