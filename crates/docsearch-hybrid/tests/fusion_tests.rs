use async_trait::async_trait;
use docsearch_core::types::{Chunk, ChunkKind, Meta};
use docsearch_core::{Error, RerankGateway, Result, SearchResult};
use docsearch_hybrid::{FusionConfig, RankFusion};

fn candidate(id: &str, similarity: f32) -> SearchResult {
    let chunk = Chunk {
        id: id.to_string(),
        doc_id: "doc".into(),
        text: format!("text of {id}"),
        chunk_index: 0,
        total_chunks: 1,
        kind: ChunkKind::Text,
        section: None,
        line_count: 1,
        metadata: Meta::new(),
    };
    SearchResult::new(chunk, similarity)
}

fn candidates() -> Vec<SearchResult> {
    vec![candidate("a", 0.9), candidate("b", 0.8), candidate("c", 0.7), candidate("d", 0.6)]
}

fn ids(results: &[SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.id()).collect()
}

struct FixedScorer(Vec<Option<f32>>);

#[async_trait]
impl RerankGateway for FixedScorer {
    async fn score(&self, _query: &str, _candidates: &[String]) -> Result<Vec<Option<f32>>> {
        Ok(self.0.clone())
    }
}

struct DownScorer;

#[async_trait]
impl RerankGateway for DownScorer {
    async fn score(&self, _query: &str, _candidates: &[String]) -> Result<Vec<Option<f32>>> {
        Err(Error::UpstreamUnavailable("rerank service unreachable".into()))
    }
}

#[tokio::test]
async fn without_scorer_results_are_truncated_unchanged() {
    let fusion = RankFusion::default();
    let outcome = fusion.fuse("q", candidates(), None, 2).await;

    assert!(!outcome.applied);
    assert_eq!(outcome.results, candidates()[..2].to_vec());
}

#[tokio::test]
async fn relevance_reorders_candidates() {
    let fusion = RankFusion::default();
    let scorer = FixedScorer(vec![Some(0.1), Some(0.2), Some(0.95), Some(0.5)]);
    let outcome = fusion.fuse("q", candidates(), Some(&scorer), 3).await;

    assert!(outcome.applied);
    assert_eq!(ids(&outcome.results), vec!["c", "d", "b"]);
    let top = &outcome.results[0];
    assert_eq!(top.relevance, Some(0.95));
    let expected = 0.3 * 0.7 + 0.7 * 0.95;
    assert!((top.combined.unwrap() - expected).abs() < 1e-6);
    assert!((top.similarity - 0.7).abs() < 1e-6);
}

#[tokio::test]
async fn unscored_candidates_keep_weighted_similarity() {
    let fusion = RankFusion::default();
    let scorer = FixedScorer(vec![None, Some(0.6), None, None]);
    let outcome = fusion.fuse("q", candidates(), Some(&scorer), 4).await;

    assert!(outcome.applied);
    assert_eq!(outcome.results[0].id(), "b");
    let a = outcome.results.iter().find(|r| r.id() == "a").unwrap();
    assert_eq!(a.relevance, None);
    assert!((a.combined.unwrap() - 0.3 * 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn scorer_failure_falls_back_to_similarity_ranking() {
    let fusion = RankFusion::default();

    let outcome = fusion.fuse("q", candidates(), Some(&DownScorer), 3).await;
    assert!(!outcome.applied);
    assert_eq!(ids(&outcome.results), vec!["a", "b", "c"]);

    let none_scored = FixedScorer(vec![None; 4]);
    let outcome = fusion.fuse("q", candidates(), Some(&none_scored), 3).await;
    assert!(!outcome.applied);
    assert!(outcome.results.iter().all(|r| r.combined.is_none()));

    let too_short = FixedScorer(vec![Some(1.0)]);
    let outcome = fusion.fuse("q", candidates(), Some(&too_short), 3).await;
    assert!(!outcome.applied);
    assert_eq!(ids(&outcome.results), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn out_of_range_scores_are_clamped() {
    let fusion = RankFusion::default();
    let scorer = FixedScorer(vec![Some(7.0), Some(-2.0), Some(f32::NAN), Some(0.5)]);
    let outcome = fusion.fuse("q", candidates(), Some(&scorer), 4).await;

    let by_id = |id: &str| outcome.results.iter().find(|r| r.id() == id).cloned().unwrap();
    assert_eq!(by_id("a").relevance, Some(1.0));
    assert_eq!(by_id("b").relevance, Some(0.0));
    assert_eq!(by_id("c").relevance, None);
}

#[test]
fn ties_keep_incoming_order() {
    let fusion = RankFusion::new(FusionConfig { vector_weight: 0.0, relevance_weight: 1.0 });
    let fused = fusion.apply_scores(&candidates(), &[Some(0.5), Some(0.5), Some(0.9), Some(0.5)], 4);
    assert_eq!(ids(&fused), vec!["c", "a", "b", "d"]);
}

#[test]
fn combine_uses_configured_weights() {
    let fusion = RankFusion::new(FusionConfig { vector_weight: 0.5, relevance_weight: 0.5 });
    assert!((fusion.combine(0.8, Some(0.4)) - 0.6).abs() < 1e-6);
    assert!((fusion.combine(0.8, None) - 0.4).abs() < 1e-6);
}
