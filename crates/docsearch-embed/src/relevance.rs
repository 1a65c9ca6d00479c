//! Secondary relevance scorers for rank fusion.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use docsearch_core::config::RerankSettings;
use docsearch_core::similarity::{cosine_similarity, sharpen};
use docsearch_core::{EmbeddingGateway, RerankGateway, Result};
use futures::future::join_all;

/// Scores candidates by embedding them next to the query and sharpening the
/// cosine similarity through a logistic curve.
pub struct EmbeddingRelevanceScorer {
    gateway: Arc<dyn EmbeddingGateway>,
    max_chars: usize,
    steepness: f32,
    midpoint: f32,
}

impl EmbeddingRelevanceScorer {
    pub fn new(gateway: Arc<dyn EmbeddingGateway>) -> Self {
        Self::with_settings(gateway, &RerankSettings::default())
    }

    pub fn with_settings(gateway: Arc<dyn EmbeddingGateway>, settings: &RerankSettings) -> Self {
        Self { gateway, max_chars: settings.max_candidate_chars, steepness: settings.steepness, midpoint: settings.midpoint }
    }

    async fn score_one(&self, query_vec: &[f32], candidate: &str) -> Option<f32> {
        if candidate.trim().is_empty() {
            return Some(0.0);
        }
        let text: String = candidate.chars().take(self.max_chars).collect();
        match self.gateway.embed_one(&text).await {
            Ok(v) => Some(sharpen(cosine_similarity(query_vec, &v), self.steepness, self.midpoint)),
            Err(e) => {
                tracing::warn!("candidate embedding failed, leaving it unscored: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl RerankGateway for EmbeddingRelevanceScorer {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<Option<f32>>> {
        let query_vec = self.gateway.embed_one(query).await?;
        let scores = join_all(candidates.iter().map(|c| self.score_one(&query_vec, c))).await;
        Ok(scores)
    }
}

/// Offline lexical scorer: the share of distinct query words found in the
/// candidate, damped for candidates shorter than `full_length` chars.
#[derive(Debug, Clone)]
pub struct KeywordRelevanceScorer {
    full_length: usize,
}

impl Default for KeywordRelevanceScorer {
    fn default() -> Self { Self { full_length: 500 } }
}

impl KeywordRelevanceScorer {
    pub fn new() -> Self { Self::default() }

    pub fn score_text(&self, query: &str, candidate: &str) -> f32 {
        let query_words: HashSet<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if query_words.is_empty() || candidate.is_empty() {
            return 0.0;
        }
        let candidate_words: HashSet<String> = candidate.split_whitespace().map(str::to_lowercase).collect();
        let hits = query_words.intersection(&candidate_words).count();
        let overlap = hits as f32 / query_words.len() as f32;
        let length_factor = (candidate.chars().count() as f32 / self.full_length.max(1) as f32).min(1.0);
        overlap * length_factor
    }
}

#[async_trait]
impl RerankGateway for KeywordRelevanceScorer {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<Option<f32>>> {
        Ok(candidates.iter().map(|c| Some(self.score_text(query, c))).collect())
    }
}
