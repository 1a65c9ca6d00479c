use docsearch_core::config::RerankSettings;
use docsearch_core::{RerankGateway, SearchResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    pub vector_weight: f32,
    pub relevance_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self { Self { vector_weight: 0.3, relevance_weight: 0.7 } }
}

impl From<&RerankSettings> for FusionConfig {
    fn from(s: &RerankSettings) -> Self { Self { vector_weight: s.vector_weight, relevance_weight: s.relevance_weight } }
}

#[derive(Debug, Clone, Default)]
pub struct FusionOutcome {
    pub results: Vec<SearchResult>,
    /// Whether secondary scores were blended in.
    pub applied: bool,
}

impl FusionOutcome {
    fn passthrough(mut candidates: Vec<SearchResult>, top_n: usize) -> Self {
        candidates.truncate(top_n);
        Self { results: candidates, applied: false }
    }
}

/// Blends the similarity ranking with per-candidate relevance scores.
#[derive(Debug, Clone, Default)]
pub struct RankFusion {
    config: FusionConfig,
}

impl RankFusion {
    pub fn new(config: FusionConfig) -> Self { Self { config } }

    /// Weighted score. An absent relevance contributes nothing.
    pub fn combine(&self, similarity: f32, relevance: Option<f32>) -> f32 {
        let relevance = relevance.map_or(0.0, |r| self.config.relevance_weight * r);
        self.config.vector_weight * similarity + relevance
    }

    /// Re-rank `candidates` by their combined score. `scores` must be
    /// parallel to `candidates`; relevance is clamped to [0, 1]. Ties keep
    /// the incoming order.
    pub fn apply_scores(&self, candidates: &[SearchResult], scores: &[Option<f32>], top_n: usize) -> Vec<SearchResult> {
        let mut fused: Vec<SearchResult> = candidates
            .iter()
            .zip(scores)
            .map(|(c, s)| {
                let relevance = s.filter(|r| r.is_finite()).map(|r| r.clamp(0.0, 1.0));
                c.fused(relevance, self.combine(c.similarity, relevance))
            })
            .collect();
        fused.sort_by(|a, b| b.score().total_cmp(&a.score()));
        fused.truncate(top_n);
        fused
    }

    /// Score candidates with `scorer` and re-rank. Without a scorer, or when
    /// scoring fails outright, the similarity ranking is returned truncated.
    pub async fn fuse(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
        scorer: Option<&dyn RerankGateway>,
        top_n: usize,
    ) -> FusionOutcome {
        let Some(scorer) = scorer else {
            return FusionOutcome::passthrough(candidates, top_n);
        };
        if candidates.is_empty() {
            return FusionOutcome::default();
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();
        let scores = match scorer.score(query, &texts).await {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!("relevance scoring failed, keeping similarity ranking: {e}");
                return FusionOutcome::passthrough(candidates, top_n);
            }
        };
        if scores.len() != candidates.len() {
            tracing::warn!(expected = candidates.len(), got = scores.len(), "scorer returned a mismatched score list");
            return FusionOutcome::passthrough(candidates, top_n);
        }
        if scores.iter().all(Option::is_none) {
            tracing::warn!("no candidate could be scored, keeping similarity ranking");
            return FusionOutcome::passthrough(candidates, top_n);
        }

        let unscored = scores.iter().filter(|s| s.is_none()).count();
        if unscored > 0 {
            tracing::debug!(unscored, "some candidates fall back to similarity-only scoring");
        }
        FusionOutcome { results: self.apply_scores(&candidates, &scores, top_n), applied: true }
    }
}
