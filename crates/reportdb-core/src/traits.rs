use async_trait::async_trait;

use crate::types::{Collection, ImageAnalysis, StoredFragment};

/// Text embedding provider.
///
/// `embed` yields `Ok(None)` when there is nothing to embed (empty input) and
/// `Err` when the provider fails; callers at query time treat both as "no
/// vector for this text".
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> anyhow::Result<Option<Vec<f32>>>;

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Option<Vec<f32>>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts { out.push(self.embed(t).await?); }
        Ok(out)
    }
}

/// Read side of the persistent fragment store.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// Nearest neighbours of `query_vec` in `collection`, ascending distance.
    async fn nearest(&self, collection: Collection, query_vec: &[f32], limit: usize) -> anyhow::Result<Vec<StoredFragment>>;

    /// Case-insensitive containment match of `pattern` against fragment text.
    async fn substring_match(&self, collection: Collection, pattern: &str, limit: usize) -> anyhow::Result<Vec<StoredFragment>>;
}

/// Answer-generation provider.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Vision provider that turns a page image into searchable text.
///
/// `context` is nearby page text; providers may use it to disambiguate.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe(&self, data_url: &str, context: &str) -> anyhow::Result<ImageAnalysis>;
}
