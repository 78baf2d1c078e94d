//! Answer generation over an OpenAI-compatible `/chat/completions` endpoint.

pub mod vision;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use reportdb_core::config::GenerationSettings;
use reportdb_core::traits::Generator;

pub use vision::OpenAiImageDescriber;

pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(api_key: impl Into<String>, settings: &GenerationSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("building chat HTTP client")?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }

    /// Reads the key from `OPENAI_API_KEY`.
    pub fn from_env(settings: &GenerationSettings) -> Result<Self> {
        let key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        Self::new(key, settings)
    }

    /// One user message carrying the whole prompt.
    pub fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Text of the first choice, trimmed.
pub fn parse_chat_response(body: &str) -> Result<String> {
    let resp: ChatResponse = serde_json::from_str(body).context("decoding chat response")?;
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow!("chat response has no content"))?;
    let content = content.trim();
    if content.is_empty() { bail!("chat response content is empty"); }
    Ok(content.to_string())
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let start = Instant::now();
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt))
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(%status, "chat completion failed");
            bail!("chat completion returned {}: {}", status, body.chars().take(200).collect::<String>());
        }
        debug!(ms = start.elapsed().as_millis() as u64, model = %self.model, "chat completion");
        parse_chat_response(&body)
    }
}
