//! Batched embedding with per-batch recovery.
//!
//! A failed batch is retried once (when enabled). If it still fails, every
//! text in it gets a zero vector and its position is reported as degraded so
//! callers can tell real embeddings from placeholders.

use std::time::Duration;

use docsearch_core::config::EmbeddingSettings;
use docsearch_core::{EmbeddingGateway, Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub pause: Duration,
    pub retry: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from(&EmbeddingSettings::default())
    }
}

impl From<&EmbeddingSettings> for BatchOptions {
    fn from(s: &EmbeddingSettings) -> Self {
        Self { batch_size: s.batch_size.max(1), pause: Duration::from_millis(s.batch_pause_ms), retry: s.retry_failed_batches }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmbeddedBatch {
    /// One vector per input text, in input order.
    pub vectors: Vec<Vec<f32>>,
    /// Positions of inputs that received a zero-vector placeholder.
    pub degraded: Vec<usize>,
}

impl EmbeddedBatch {
    pub fn is_degraded(&self) -> bool { !self.degraded.is_empty() }
}

async fn embed_checked(gateway: &dyn EmbeddingGateway, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let vectors = gateway.embed_batch(texts).await?;
    if vectors.len() != texts.len() {
        return Err(Error::MalformedUpstreamResponse(format!(
            "expected {} embeddings, got {}",
            texts.len(),
            vectors.len()
        )));
    }
    let dim = gateway.dimension();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(Error::MalformedUpstreamResponse(format!(
            "embedding of length {} where {} was expected",
            bad.len(),
            dim
        )));
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(Error::MalformedUpstreamResponse("embedding has a non-finite component".into()));
    }
    Ok(vectors)
}

/// Embed `texts` in batches of `options.batch_size`, pausing between batches.
pub async fn embed_in_batches(gateway: &dyn EmbeddingGateway, texts: &[String], options: BatchOptions) -> EmbeddedBatch {
    let mut out = EmbeddedBatch { vectors: Vec::with_capacity(texts.len()), degraded: Vec::new() };
    let batch_count = texts.len().div_ceil(options.batch_size.max(1));

    for (batch_no, batch) in texts.chunks(options.batch_size.max(1)).enumerate() {
        if batch_no > 0 && !options.pause.is_zero() {
            tokio::time::sleep(options.pause).await;
        }

        let mut result = embed_checked(gateway, batch).await;
        if let Err(e) = &result {
            if options.retry {
                tracing::warn!(batch = batch_no + 1, of = batch_count, "embedding batch failed, retrying: {e}");
                result = embed_checked(gateway, batch).await;
            }
        }

        match result {
            Ok(vectors) => out.vectors.extend(vectors),
            Err(e) => {
                tracing::error!(batch = batch_no + 1, of = batch_count, "embedding batch failed: {e}");
                tracing::warn!(texts = batch.len(), "substituting zero vectors");
                let start = out.vectors.len();
                out.degraded.extend(start..start + batch.len());
                out.vectors.extend(std::iter::repeat_with(|| vec![0.0; gateway.dimension()]).take(batch.len()));
            }
        }
        tracing::debug!(batch = batch_no + 1, of = batch_count, "embedded batch");
    }
    out
}
