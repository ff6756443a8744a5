use super::{FileContext, Validator, LOGGING_CHECKER, PRINT_STATEMENTS};
use crate::findings::{RawComment, ValidatorResult};
use crate::llm::{number_lines, parse_comments, Completion, COMMENTS_FORMAT};
use crate::taxonomy::LOGGING;
use anyhow::Result;
use regex::Regex;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a senior engineer reviewing logging practices.";

pub struct LoggingChecker {
    completion: Arc<dyn Completion>,
}

impl LoggingChecker {
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        Self { completion }
    }
}

impl Validator for LoggingChecker {
    fn name(&self) -> &str {
        LOGGING_CHECKER
    }

    fn analyze(&self, content: &str, _context: Option<&FileContext<'_>>) -> Result<ValidatorResult> {
        if content.trim().is_empty() {
            return Ok(ValidatorResult::empty());
        }

        let prompt = format!(
            "Review the logging in this code. Report: errors that are caught without being logged, \
             log calls at the wrong level, secrets or personal data written to logs, \
             string formatting done eagerly inside log calls, and missing context in log messages.\n\n\
             {}\n\nCode:\n{}",
            COMMENTS_FORMAT,
            number_lines(content)
        );
        let answer = self.completion.complete(SYSTEM_PROMPT, &prompt)?;
        Ok(ValidatorResult::from_comments(parse_comments(&answer, LOGGING)?))
    }
}

/// Flags lines that write straight to stdout instead of going through a
/// logger. Comment lines are skipped.
pub struct PrintStatementChecker {
    patterns: Vec<Regex>,
}

impl PrintStatementChecker {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: vec![
                Regex::new(r"(^|[^\w.])print\s*\(")?,
                Regex::new(r"\bconsole\.(log|debug|info)\s*\(")?,
                Regex::new(r"\b(e)?println!\s*\(")?,
                Regex::new(r"\bSystem\.(out|err)\.print(ln)?\s*\(")?,
                Regex::new(r"\bfmt\.Print(ln|f)?\s*\(")?,
            ],
        })
    }

    fn is_comment(line: &str) -> bool {
        let trimmed = line.trim_start();
        trimmed.starts_with('#') || trimmed.starts_with("//") || trimmed.starts_with('*')
    }
}

impl Validator for PrintStatementChecker {
    fn name(&self) -> &str {
        PRINT_STATEMENTS
    }

    fn analyze(&self, content: &str, _context: Option<&FileContext<'_>>) -> Result<ValidatorResult> {
        let comments = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !Self::is_comment(line))
            .filter(|(_, line)| self.patterns.iter().any(|re| re.is_match(line)))
            .map(|(idx, _)| {
                RawComment::at_line(LOGGING, idx + 1, "Output is written to stdout instead of a logger")
                    .with_suggestion("Use the project's logger with an appropriate level")
            })
            .collect();
        Ok(ValidatorResult::from_comments(comments))
    }
}
