use crate::error::ReviewError;
use crate::taxonomy::CategoryTaxonomy;
use serde::{Deserialize, Serialize};

/// One issue reported by a validator, before its title is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawComment {
    pub key: String,
    pub start_line: usize,
    pub end_line: usize,
    pub message: String,
    pub suggestion: Option<String>,
}

impl RawComment {
    /// Lines are 1-based; the range is clamped so that `1 <= start <= end`.
    pub fn new(key: &str, start_line: usize, end_line: usize, message: impl Into<String>) -> Self {
        let (start_line, end_line) = normalize_lines(start_line, end_line);
        Self {
            key: key.to_string(),
            start_line,
            end_line,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn at_line(key: &str, line: usize, message: impl Into<String>) -> Self {
        Self::new(key, line, line, message)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        let suggestion = suggestion.into();
        self.suggestion = if suggestion.trim().is_empty() {
            None
        } else {
            Some(suggestion)
        };
        self
    }
}

fn normalize_lines(start: usize, end: usize) -> (usize, usize) {
    let start = start.max(1);
    (start, end.max(start))
}

/// Output of one validator on one file. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorResult {
    pub comments: Vec<RawComment>,
}

impl ValidatorResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_comments(comments: Vec<RawComment>) -> Self {
        Self { comments }
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }
}

/// A project-level finding as produced by the requirements matcher or the
/// structure analyzer, keyed but not yet titled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedFinding {
    pub key: String,
    pub message: String,
}

impl TypedFinding {
    pub fn new(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// A file-scoped finding with its category title resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFinding {
    pub title: String,
    #[serde(rename = "filepath")]
    pub path: String,
    #[serde(rename = "start_string_number")]
    pub start_line: usize,
    #[serde(rename = "end_string_number")]
    pub end_line: usize,
    #[serde(rename = "comment")]
    pub message: String,
    pub suggestion: Option<String>,
}

impl CodeFinding {
    pub fn resolve(raw: RawComment, path: &str, taxonomy: &CategoryTaxonomy) -> Result<Self, ReviewError> {
        let title = taxonomy.resolve(&raw.key)?.to_string();
        let (start_line, end_line) = normalize_lines(raw.start_line, raw.end_line);
        Ok(Self {
            title,
            path: path.to_string(),
            start_line,
            end_line,
            message: raw.message,
            suggestion: raw.suggestion,
        })
    }
}

/// A project-scoped finding; carries no file or line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFinding {
    pub title: String,
    #[serde(rename = "comment")]
    pub message: String,
}

impl ProjectFinding {
    pub fn resolve(finding: TypedFinding, taxonomy: &CategoryTaxonomy) -> Result<Self, ReviewError> {
        Ok(Self {
            title: taxonomy.resolve(&finding.key)?.to_string(),
            message: finding.message,
        })
    }
}
