//! Embedding providers for reportdb.
//!
//! Three backends implement [`Embedder`]: a remote OpenAI-compatible API, a
//! local BGE-M3 model run with candle, and a hashed bag-of-tokens embedder.
//! `APP_USE_FAKE_EMBEDDINGS=1` forces the hashed embedder regardless of
//! settings, for tests and offline development.

pub mod hashed;
pub mod local;
pub mod openai;
pub mod pool;

use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::info;

use reportdb_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use reportdb_core::traits::Embedder;

pub use hashed::HashedEmbedder;
pub use local::LocalEmbedder;
pub use openai::OpenAiEmbedder;
pub use pool::masked_mean_l2;

/// Newlines become spaces and the text is trimmed; blank input yields `None`.
pub fn clean_input(text: &str) -> Option<String> {
    let cleaned = text.replace('\n', " ").trim().to_string();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if settings.dimension == 0 { bail!("embedding.dimension must be positive"); }
    if use_fake_embeddings() {
        info!(dim = settings.dimension, "using hashed embedder (APP_USE_FAKE_EMBEDDINGS)");
        return Ok(Arc::new(HashedEmbedder::new(settings.dimension)));
    }
    let embedder: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProviderKind::OpenAi => Arc::new(OpenAiEmbedder::from_env(settings)?),
        EmbeddingProviderKind::Local => Arc::new(LocalEmbedder::load(settings)?),
        EmbeddingProviderKind::Hashed => Arc::new(HashedEmbedder::new(settings.dimension)),
    };
    info!(provider = ?settings.provider, dim = embedder.dim(), "embedder ready");
    Ok(embedder)
}
