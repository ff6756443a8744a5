//! Per-file validators.
//!
//! A validator declares once, when it is registered, whether it needs the
//! file's layer and path. The set hands that context only to validators
//! that asked for it and concatenates their comments in registration order.

mod layer_matcher;
mod logging;
mod review;

pub use layer_matcher::LayerMatcher;
pub use logging::{LoggingChecker, PrintStatementChecker};
pub use review::CodeReviewer;

use crate::error::ReviewError;
use crate::findings::{RawComment, ValidatorResult};
use crate::llm::Completion;
use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;

/// Where a file sits in the project. `layer` is `None` in single-file
/// reviews.
#[derive(Debug, Clone, Copy)]
pub struct FileContext<'a> {
    pub path: &'a Path,
    pub layer: Option<&'a str>,
}

pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `analyze` should receive the file's `FileContext`.
    fn needs_file_context(&self) -> bool {
        false
    }

    fn analyze(&self, content: &str, context: Option<&FileContext<'_>>) -> Result<ValidatorResult>;
}

struct Registered {
    validator: Box<dyn Validator>,
    needs_context: bool,
}

#[derive(Default)]
pub struct ValidatorSet {
    validators: Vec<Registered>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, validator: Box<dyn Validator>) {
        let needs_context = validator.needs_file_context();
        self.validators.push(Registered {
            validator,
            needs_context,
        });
    }

    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.register(Box::new(validator));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.validators.iter().map(|r| r.validator.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run every validator on one file. The first failing validator fails
    /// the whole file.
    pub fn run(&self, content: &str, context: &FileContext<'_>) -> Result<Vec<RawComment>, ReviewError> {
        let mut comments = Vec::new();
        for registered in &self.validators {
            let context = registered.needs_context.then_some(context);
            let result = registered
                .validator
                .analyze(content, context)
                .map_err(|err| ReviewError::Validator {
                    validator: registered.validator.name().to_string(),
                    message: format!("{:#}", err),
                })?;
            comments.extend(result.comments);
        }
        Ok(comments)
    }
}

pub const LAYER_MATCHER: &str = "layer_matcher";
pub const LOGGING_CHECKER: &str = "logging";
pub const CODE_REVIEWER: &str = "review";
pub const PRINT_STATEMENTS: &str = "print_statements";

/// Build the configured validators in order. LLM-backed validators are
/// left out when no completion backend is available.
pub fn build_validator_set(names: &[String], completion: Option<Arc<dyn Completion>>) -> Result<ValidatorSet> {
    let mut set = ValidatorSet::new();
    for name in names {
        let needs_llm = matches!(name.as_str(), LAYER_MATCHER | LOGGING_CHECKER | CODE_REVIEWER);
        if needs_llm && completion.is_none() {
            tracing::info!(validator = %name, "skipping LLM validator");
            continue;
        }

        match (name.as_str(), completion.clone()) {
            (PRINT_STATEMENTS, _) => set.register(Box::new(PrintStatementChecker::new()?)),
            (LAYER_MATCHER, Some(c)) => set.register(Box::new(LayerMatcher::new(c))),
            (LOGGING_CHECKER, Some(c)) => set.register(Box::new(LoggingChecker::new(c))),
            (CODE_REVIEWER, Some(c)) => set.register(Box::new(CodeReviewer::new(c))),
            _ => bail!("unknown validator `{}`", name),
        }
    }
    Ok(set)
}
