use anyhow::Result;
use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use reportdb_core::traits::Embedder;

use crate::clean_input;

/// Deterministic bag-of-tokens embedder.
///
/// Each lower-cased token is hashed into one bucket; the vector is then
/// L2-normalized. Texts sharing words land close together, which is enough
/// for offline development and tests.
pub struct HashedEmbedder { dim: usize }

impl HashedEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_sync(&self, text: &str) -> Option<Vec<f32>> {
        let cleaned = clean_input(text)?;
        let mut v = vec![0f32; self.dim];
        for (i, token) in cleaned.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        Some(v)
    }
}

#[async_trait]
impl Embedder for HashedEmbedder {
    fn dim(&self) -> usize { self.dim }
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> { Ok(self.embed_sync(text)) }
}
