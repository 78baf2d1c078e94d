//! BGE-M3 (XLM-RoBERTa) embeddings computed locally with candle.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{XLMRobertaModel, Config as XLMRobertaConfig};
use tokenizers::Tokenizer;

use reportdb_core::config::{expand_path, EmbeddingSettings};
use reportdb_core::traits::Embedder;

use crate::{clean_input, pool::masked_mean_l2};

const MAX_LEN: usize = 256;
const PAD_ID: u32 = 1;

/// Metal when built with the `metal` feature and a GPU is present, else CPU.
fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) {
            info!(device = "metal", "embedding device selected");
            return dev;
        }
    }
    info!(device = "cpu", "embedding device selected");
    Device::Cpu
}

/// `[1, MAX_LEN]` token ids and attention mask, truncated or padded.
fn encode(tokenizer: &Tokenizer, text: &str, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer.encode(text, true).map_err(|e| anyhow!("tokenizing failed: {}", e))?;
    let keep = enc.get_ids().len().min(MAX_LEN);
    let ids = enc.get_ids()[..keep].iter().copied().chain(std::iter::repeat(PAD_ID)).take(MAX_LEN);
    let mask = enc.get_attention_mask()[..keep].iter().copied().chain(std::iter::repeat(0)).take(MAX_LEN);
    let input_ids = Tensor::from_iter(ids, device)?.reshape((1, MAX_LEN))?;
    let attention_mask = Tensor::from_iter(mask, device)?.reshape((1, MAX_LEN))?;
    Ok((input_ids, attention_mask))
}

struct BgeModel { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, dim: usize }

impl BgeModel {
    fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading BGE-M3 model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow!("hidden_size missing from {}", config_path.display()))? as usize;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!(dim, "BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device, dim })
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = encode(&self.tokenizer, text, &self.device)?;
        let token_type_ids = Tensor::zeros((1, MAX_LEN), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let v: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if start.elapsed().as_millis() > 100 { warn!(ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(v)
    }
}

pub struct LocalEmbedder { inner: Arc<BgeModel> }

impl LocalEmbedder {
    pub fn load(settings: &EmbeddingSettings) -> Result<Self> {
        let dir = resolve_model_dir(settings.model_dir.as_deref())?;
        let model = BgeModel::load(&dir)?;
        if model.dim != settings.dimension {
            return Err(anyhow!("local model produces {} dims but embedding.dimension is {}", model.dim, settings.dimension));
        }
        Ok(Self { inner: Arc::new(model) })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn dim(&self) -> usize { self.inner.dim }

    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let Some(cleaned) = clean_input(text) else { return Ok(None) };
        let inner = Arc::clone(&self.inner);
        let v = tokio::task::spawn_blocking(move || inner.embed_text(&cleaned)).await??;
        Ok(Some(v))
    }
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured { let p = expand_path(dir); if p.exists() { return Ok(p); } warn!(dir = %p.display(), "configured model dir not found"); }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = expand_path(&dir); if p.exists() { return Ok(p); } }
    for candidate in ["../models/bge-m3", "models/bge-m3"] { let p = PathBuf::from(candidate); if p.exists() { return Ok(p); } }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}
