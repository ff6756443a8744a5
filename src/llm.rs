//! Client for the external reasoning service.
//!
//! Review tasks run on a fixed worker pool, so the client is blocking: one
//! worker waits on one request at a time and the pool size bounds how many
//! requests are in flight.

use crate::config::{LLMConfig, LLMProvider};
use crate::findings::RawComment;
use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

/// A text-in/text-out completion backend. Validators and the LLM layer
/// classifier depend on this rather than on a concrete client.
pub trait Completion: Send + Sync {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

pub struct LLMClient {
    config: LLMConfig,
    client: Client,
}

impl LLMClient {
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { config, client })
    }

    fn complete_with_openai(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let api_key = self.config.api_key.as_ref()
            .ok_or_else(|| anyhow!("OpenAI API key not provided"))?;

        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt }
            ],
            "max_completion_tokens": self.config.max_tokens,
            "temperature": self.config.temperature
        });

        tracing::debug!(provider = "openai", model = %self.config.model, "sending completion request");

        let response = self.client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()?;

        if !response.status().is_success() {
            let error_text = response.text()?;
            return Err(anyhow!("OpenAI API error: {}", error_text));
        }

        let response_json: serde_json::Value = response.json()?;
        response_json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid response format from OpenAI"))
    }

    fn complete_with_ollama(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let base_url = self.config.base_url.as_deref().unwrap_or("http://localhost:11434");

        let payload = serde_json::json!({
            "model": self.config.model,
            "prompt": format!("System: {}\n\nUser: {}", system_prompt, user_prompt),
            "stream": false,
            "format": "json",
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.max_tokens
            }
        });

        tracing::debug!(provider = "ollama", model = %self.config.model, base_url, "sending completion request");

        let response = self.client
            .post(format!("{}/api/generate", base_url))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()?;

        if !response.status().is_success() {
            let error_text = response.text()?;
            return Err(anyhow!("Ollama API error: {}", error_text));
        }

        let response_json: serde_json::Value = response.json()?;
        response_json["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid response format from Ollama"))
    }

    fn complete_with_anthropic(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let api_key = self.config.api_key.as_ref()
            .ok_or_else(|| anyhow!("Anthropic API key not provided"))?;

        let payload = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": system_prompt,
            "messages": [
                { "role": "user", "content": user_prompt }
            ]
        });

        tracing::debug!(provider = "anthropic", model = %self.config.model, "sending completion request");

        let response = self.client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("Content-Type", "application/json")
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()?;

        if !response.status().is_success() {
            let error_text = response.text()?;
            return Err(anyhow!("Anthropic API error: {}", error_text));
        }

        let response_json: serde_json::Value = response.json()?;
        response_json["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid response format from Anthropic"))
    }
}

impl Completion for LLMClient {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        match self.config.provider {
            LLMProvider::OpenAI => self.complete_with_openai(system_prompt, user_prompt),
            LLMProvider::Ollama => self.complete_with_ollama(system_prompt, user_prompt),
            LLMProvider::Anthropic => self.complete_with_anthropic(system_prompt, user_prompt),
        }
    }
}

/// Prefix every line with its 1-based number so the model can cite lines.
pub fn number_lines(content: &str) -> String {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| format!("{}: {}", idx + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The JSON payload of a model answer, with any Markdown code fence removed.
///
/// Only fences that open a line count: a JSON string cannot hold a raw
/// newline, so a fence inside a `suggestion` value never matches.
pub fn extract_json(answer: &str) -> &str {
    let trimmed = answer.trim();
    if serde_json::from_str::<serde::de::IgnoredAny>(trimmed).is_ok() {
        return trimmed;
    }

    let fences: Vec<usize> = trimmed
        .match_indices("```")
        .map(|(idx, _)| idx)
        .filter(|idx| *idx == 0 || trimmed[..*idx].ends_with('\n'))
        .collect();
    let Some(&open) = fences.first() else {
        return trimmed;
    };

    let after_fence = &trimmed[open + 3..];
    // Skip the info string ("json") up to the end of the fence line.
    let body_start = after_fence.find('\n').map_or(after_fence.len(), |i| i + 1);
    let body = &after_fence[body_start..];
    let body_offset = open + 3 + body_start;
    match fences.iter().rev().find(|idx| **idx >= body_offset) {
        Some(&close) => trimmed[body_offset..close].trim(),
        None => body.trim(),
    }
}

/// Output format every comment-producing prompt asks for.
pub const COMMENTS_FORMAT: &str = r#"Answer with JSON only, in this format:
{"comments": [{"start_line_number": 1, "end_line_number": 1, "comment": "what is wrong", "suggestion": "how to fix it, or null"}]}
Return {"comments": []} when there is nothing to report."#;

#[derive(Debug, Deserialize)]
struct CommentsAnswer {
    #[serde(default)]
    comments: Vec<AnswerComment>,
}

#[derive(Debug, Deserialize)]
struct AnswerComment {
    start_line_number: usize,
    end_line_number: Option<usize>,
    comment: String,
    #[serde(default)]
    suggestion: Option<serde_json::Value>,
}

/// Parse a `COMMENTS_FORMAT` answer into raw comments tagged with `key`.
pub fn parse_comments(answer: &str, key: &str) -> Result<Vec<RawComment>> {
    let parsed: CommentsAnswer = serde_json::from_str(extract_json(answer))
        .with_context(|| format!("model answer is not a comments object: {}", truncate(answer, 200)))?;

    Ok(parsed
        .comments
        .into_iter()
        .map(|c| {
            let end = c.end_line_number.unwrap_or(c.start_line_number);
            let comment = RawComment::new(key, c.start_line_number, end, c.comment);
            match c.suggestion {
                Some(serde_json::Value::String(s)) => comment.with_suggestion(s),
                Some(serde_json::Value::Null) | None => comment,
                Some(other) => comment.with_suggestion(other.to_string()),
            }
        })
        .collect())
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
