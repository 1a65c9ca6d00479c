use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use docsearch_core::similarity::l2_normalize;
use docsearch_core::{EmbeddingGateway, Result};
use twox_hash::XxHash64;

/// Deterministic feature-hashing embedder. Each lowercased alphanumeric token
/// lands in one bucket with a weight derived from its hash, then the vector is
/// L2-normalized. Texts sharing words get positive cosine similarity, which is
/// enough to exercise retrieval without a model.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let weight = 0.5 + 0.5 * (((h >> 32) as u32) as f32 / u32::MAX as f32);
            v[idx] += weight;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingGateway for HashingEmbedder {
    fn dimension(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
