use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;

use crate::model::{ChatModel, ChatRequest, ModelError};

const RATE_LIMIT_MARKER: &str = "Rate limit reached";

pub fn chat_completions_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/chat/completions")
}

/// Chat completions over HTTP with bearer auth.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiChat {
    pub fn new(base_url: &str, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("build OpenAI http client")?;
        Ok(Self {
            client,
            endpoint: chat_completions_endpoint(base_url),
            api_key,
        })
    }

    /// Reads `OPENAI_API_KEY` from the environment.
    pub fn from_env(base_url: &str) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;
        Self::new(base_url, api_key)
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ModelError> {
        let endpoint = &self.endpoint;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| ModelError::Other(format!("POST {endpoint}: {err}")))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|err| ModelError::Other(format!("read OpenAI response body: {err}")))?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or(raw);
            return Err(classify_error(status, message));
        }

        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|err| ModelError::Other(format!("parse OpenAI response: {err}")))?;
        extract_message_content(&value).map_err(|err| ModelError::Other(format!("{err:#}")))
    }
}

fn classify_error(status: StatusCode, message: String) -> ModelError {
    let message = format!("OpenAI API error ({status}): {message}");
    if status == StatusCode::TOO_MANY_REQUESTS || message.contains(RATE_LIMIT_MARKER) {
        ModelError::RateLimited(message)
    } else {
        ModelError::Other(message)
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_message_content(value: &serde_json::Value) -> anyhow::Result<String> {
    let content = value
        .pointer("/choices/0/message/content")
        .ok_or_else(|| anyhow::anyhow!("missing `choices[0].message.content` in response"))?
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("`choices[0].message.content` is not a string"))?;

    if content.trim().is_empty() {
        anyhow::bail!("OpenAI message content is empty");
    }
    Ok(content.to_owned())
}
