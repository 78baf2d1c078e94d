//! Page-image descriptions from an OpenAI-compatible vision chat model.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use reportdb_core::config::GenerationSettings;
use reportdb_core::data_processor::IMAGE_PROMPT_CONTEXT_CHARS;
use reportdb_core::traits::ImageDescriber;
use reportdb_core::types::ImageAnalysis;

use crate::parse_chat_response;

const FALLBACK_DESCRIPTION_CHARS: usize = 500;
const FALLBACK_INSIGHT_CHARS: usize = 300;

pub struct OpenAiImageDescriber {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct VisionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<VisionMessage<'a>>,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct VisionMessage<'a> {
    pub role: &'a str,
    pub content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart<'a> {
    Text { text: String },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl<'a> {
    pub url: &'a str,
}

pub fn vision_prompt(context: &str) -> String {
    let context: String = context.chars().take(IMAGE_PROMPT_CONTEXT_CHARS).collect();
    format!(
        "Analyze this image in detail and provide:\n\
         1. Detailed description of what you see\n\
         2. Any text/numbers you can read (OCR)\n\
         3. Key data points, trends, or insights\n\
         4. Type of visual (chart, table, diagram, etc.)\n\
         5. Context: This image appears near: {}\n\n\
         Be very detailed and specific. Extract ALL visible information.\n\n\
         Format as JSON:\n\
         {{\n  \"detailed_description\": \"comprehensive description\",\n  \"ocr_text\": \"all text found in image\",\n  \
         \"key_insights\": \"important findings and data\",\n  \"visual_type\": \"chart/table/diagram/photo/etc\",\n  \
         \"data_extracted\": \"specific numbers, percentages, values\"\n}}",
        context
    )
}

/// Reads the model's JSON answer, tolerating a Markdown code fence.
/// Non-JSON answers become a description plus insights cut from the raw text.
pub fn parse_image_analysis(content: &str) -> ImageAnalysis {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    match serde_json::from_str::<ImageAnalysis>(unfenced) {
        Ok(analysis) => analysis,
        Err(_) => ImageAnalysis {
            description: trimmed.chars().take(FALLBACK_DESCRIPTION_CHARS).collect(),
            key_insights: trimmed.chars().take(FALLBACK_INSIGHT_CHARS).collect(),
            visual_type: "image".to_string(),
            ..ImageAnalysis::default()
        },
    }
}

impl OpenAiImageDescriber {
    pub fn new(api_key: impl Into<String>, settings: &GenerationSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("building vision HTTP client")?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        })
    }

    /// Reads the key from `OPENAI_API_KEY`.
    pub fn from_env(settings: &GenerationSettings) -> Result<Self> {
        let key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        Self::new(key, settings)
    }

    pub fn request<'a>(&'a self, data_url: &'a str, context: &str) -> VisionRequest<'a> {
        VisionRequest {
            model: &self.model,
            messages: vec![VisionMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: vision_prompt(context) },
                    ContentPart::ImageUrl { image_url: ImageUrl { url: data_url } },
                ],
            }],
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl ImageDescriber for OpenAiImageDescriber {
    async fn describe(&self, data_url: &str, context: &str) -> Result<ImageAnalysis> {
        let url = format!("{}/chat/completions", self.api_base);
        let start = Instant::now();
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request(data_url, context))
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(%status, "image analysis failed");
            bail!("vision completion returned {}: {}", status, body.chars().take(200).collect::<String>());
        }
        debug!(ms = start.elapsed().as_millis() as u64, model = %self.model, "image analysis");
        let analysis = parse_image_analysis(&parse_chat_response(&body)?);
        if analysis.is_empty() { bail!("image analysis is empty"); }
        Ok(analysis)
    }
}
