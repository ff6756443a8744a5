use super::{FileContext, Validator, LAYER_MATCHER};
use crate::findings::ValidatorResult;
use crate::llm::{number_lines, parse_comments, Completion, COMMENTS_FORMAT};
use crate::taxonomy::ARCHITECTURE;
use anyhow::Result;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a software architect reviewing whether code respects the layered architecture of its project.";

/// Checks that a file only does what its architectural layer is meant to
/// do (no SQL in request handlers, no HTTP concerns in repositories, ...).
pub struct LayerMatcher {
    completion: Arc<dyn Completion>,
}

impl LayerMatcher {
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        Self { completion }
    }
}

impl Validator for LayerMatcher {
    fn name(&self) -> &str {
        LAYER_MATCHER
    }

    fn needs_file_context(&self) -> bool {
        true
    }

    fn analyze(&self, content: &str, context: Option<&FileContext<'_>>) -> Result<ValidatorResult> {
        // Without a layer there is nothing to match against.
        let Some((path, layer)) = context.and_then(|c| c.layer.map(|layer| (c.path, layer))) else {
            return Ok(ValidatorResult::empty());
        };

        let prompt = format!(
            "File `{}` belongs to the `{}` layer.\n\
             Report the places where this file takes on responsibilities of another layer \
             or depends on a layer it should not know about.\n\n{}\n\nCode:\n{}",
            path.display(),
            layer,
            COMMENTS_FORMAT,
            number_lines(content)
        );
        let answer = self.completion.complete(SYSTEM_PROMPT, &prompt)?;
        Ok(ValidatorResult::from_comments(parse_comments(&answer, ARCHITECTURE)?))
    }
}
