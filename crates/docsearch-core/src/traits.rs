//! Seams to external model services.
//!
//! Both gateways are async because real implementations talk to remote APIs.
//! Errors should use [`Error::UpstreamUnavailable`] for connectivity failures
//! and [`Error::MalformedUpstreamResponse`] for unusable replies.
use async_trait::async_trait;

use crate::error::{Error, Result};

#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Length of every vector this gateway produces.
    fn dimension(&self) -> usize;

    /// Embed `texts`, returning exactly one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedUpstreamResponse("empty embedding response".into()))
    }
}

#[async_trait]
pub trait RerankGateway: Send + Sync {
    /// Relevance of each candidate to `query`, in [0, 1]. `None` marks a
    /// candidate the gateway could not score.
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<Option<f32>>>;
}
