//! Embeddings over an OpenAI-compatible `/embeddings` endpoint.

use anyhow::{Context, Result, anyhow, ensure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use reportdb_core::config::EmbeddingSettings;
use reportdb_core::traits::Embedder;

use crate::clean_input;

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    dim: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a, I: Serialize> {
    model: &'a str,
    input: I,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>, settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("building embeddings HTTP client")?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: settings.model.clone(),
            dim: settings.dimension,
        })
    }

    /// Reads the key from `OPENAI_API_KEY`.
    pub fn from_env(settings: &EmbeddingSettings) -> Result<Self> {
        let key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        Self::new(key, settings)
    }

    async fn request<I: Serialize + Send + Sync>(&self, input: I) -> Result<Vec<EmbeddingDatum>> {
        let url = format!("{}/embeddings", self.api_base);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest { model: &self.model, input })
            .send()
            .await
            .with_context(|| format!("POST {}", url))?
            .error_for_status()?;
        let body: EmbeddingResponse = resp.json().await.context("decoding embeddings response")?;
        for d in &body.data {
            ensure!(d.embedding.len() == self.dim, "model {} returned {} dims, expected {}", self.model, d.embedding.len(), self.dim);
        }
        Ok(body.data)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dim(&self) -> usize { self.dim }

    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let Some(cleaned) = clean_input(text) else { return Ok(None) };
        let data = self.request(cleaned.as_str()).await?;
        let first = data.into_iter().next().ok_or_else(|| anyhow!("empty embeddings response"))?;
        Ok(Some(first.embedding))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let (slots, inputs): (Vec<usize>, Vec<String>) = texts
            .iter()
            .enumerate()
            .filter_map(|(i, t)| clean_input(t).map(|c| (i, c)))
            .unzip();
        if inputs.is_empty() { return Ok(out); }
        let data = self.request(&inputs).await?;
        debug!(requested = inputs.len(), returned = data.len(), "embedded batch");
        for d in data {
            if let Some(&slot) = slots.get(d.index) { out[slot] = Some(d.embedding); }
        }
        Ok(out)
    }
}
