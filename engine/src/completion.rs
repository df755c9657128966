//! Completion service seam.
//!
//! The engine only needs `complete(system, user, temperature, expect_json)`.
//! [`OpenAiCompatClient`] speaks the chat-completions dialect shared by
//! OpenAI, DeepSeek and most local gateways.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::config::CompletionConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub expect_json: bool,
}

impl CompletionRequest {
    pub fn text(system_prompt: impl Into<String>, user_prompt: impl Into<String>, temperature: f32) -> Self {
        Self { system_prompt: system_prompt.into(), user_prompt: user_prompt.into(), temperature, expect_json: false }
    }

    pub fn json(system_prompt: impl Into<String>, user_prompt: impl Into<String>, temperature: f32) -> Self {
        Self { expect_json: true, ..Self::text(system_prompt, user_prompt, temperature) }
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Await `fut` for at most `limit`. Errors and timeouts are logged and become `None`.
pub async fn bounded<T, F>(what: &'static str, limit: Duration, fut: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            warn!(op = what, error = %err, "call failed, using fallback");
            None
        }
        Err(_) => {
            warn!(op = what, timeout_ms = limit.as_millis() as u64, "call timed out, using fallback");
            None
        }
    }
}

/// First whitespace-separated token of a model reply, parsed as a confidence in [0,1].
pub fn parse_confidence(raw: &str) -> Option<f64> {
    let token = raw.split_whitespace().next()?;
    let token = token.trim_end_matches(|c: char| !c.is_ascii_digit());
    let value: f64 = token.parse().ok()?;
    if value.is_nan() {
        return None;
    }
    Some(value.clamp(0.0, 1.0))
}

/// Strip a Markdown code fence some models wrap around JSON replies.
pub fn strip_json_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else { return trimmed };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for `POST {base_url}/chat/completions`.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    pub fn from_config(cfg: &CompletionConfig) -> Self {
        Self::new(cfg.base_url.clone(), cfg.api_key.clone(), cfg.model.clone())
    }

    fn body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "temperature": request.temperature,
        });
        if request.expect_json {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| anyhow!("completion api key is not configured"))?;
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.body(&request))
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("completion service returned {}: {}", status, text);
        }
        let parsed: ChatResponse = resp.json().await.context("decoding completion response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("completion response carried no content"))
    }
}
