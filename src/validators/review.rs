use super::{FileContext, Validator, CODE_REVIEWER};
use crate::findings::ValidatorResult;
use crate::llm::{number_lines, parse_comments, Completion, COMMENTS_FORMAT};
use crate::taxonomy::REVIEW;
use anyhow::Result;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a meticulous senior engineer doing a code review. Only report real problems.";

/// Free-form review: bugs, error handling, naming, dead code.
pub struct CodeReviewer {
    completion: Arc<dyn Completion>,
}

impl CodeReviewer {
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        Self { completion }
    }
}

impl Validator for CodeReviewer {
    fn name(&self) -> &str {
        CODE_REVIEWER
    }

    fn needs_file_context(&self) -> bool {
        true
    }

    fn analyze(&self, content: &str, context: Option<&FileContext<'_>>) -> Result<ValidatorResult> {
        if content.trim().is_empty() {
            return Ok(ValidatorResult::empty());
        }

        let location = match context {
            Some(ctx) => format!("File `{}`:\n", ctx.path.display()),
            None => String::new(),
        };
        let prompt = format!(
            "{}Review this code for bugs, unsafe error handling, misleading names, \
             duplicated or dead code. Skip style nits a formatter would fix.\n\n{}\n\nCode:\n{}",
            location,
            COMMENTS_FORMAT,
            number_lines(content)
        );
        let answer = self.completion.complete(SYSTEM_PROMPT, &prompt)?;
        Ok(ValidatorResult::from_comments(parse_comments(&answer, REVIEW)?))
    }
}
