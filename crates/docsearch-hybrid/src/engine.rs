//! The retrieval engine.
//!
//! Ingest: chunk, embed in batches, upsert, persist once per call.
//! Query: embed, fetch `top_k * candidate_multiplier` candidates, fuse, truncate.
//!
//! The index sits behind a readers-writer lock; the engine is its only
//! writer, so queries run concurrently while no mutation is in flight.
//! With autosave on, a mutation is applied to a staged copy and only
//! swapped in once the snapshot is written, so a failed call leaves the
//! previous state in place.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use docsearch_core::config::Settings;
use docsearch_core::{Chunk, ChunkId, Chunker, Document, EmbeddingGateway, Error, Meta, RerankGateway, Result, SearchResult};
use docsearch_embed::{embed_in_batches, BatchOptions};
use docsearch_vector::{IndexStats, VectorIndex};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::fusion::{FusionConfig, RankFusion};

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub total_chunks: usize,
    pub indexed_chunks: usize,
    /// Chunks indexed with a zero-vector placeholder after their batch failed.
    pub degraded_chunks: Vec<ChunkId>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub indexed_chunks: usize,
    pub degraded_chunks: Vec<ChunkId>,
    pub elapsed: Duration,
}

/// Per-call overrides of the configured search settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    pub top_k: Option<usize>,
    pub similarity_floor: Option<f32>,
    pub rerank: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    /// Candidates fetched from the index before fusion.
    pub candidates: usize,
    pub fused: bool,
    pub elapsed: Duration,
}

pub struct RetrievalEngine {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingGateway>,
    scorer: Option<Arc<dyn RerankGateway>>,
    fusion: RankFusion,
    settings: Settings,
    index: RwLock<VectorIndex>,
    snapshot_path: Option<PathBuf>,
    dirty: AtomicBool,
}

impl RetrievalEngine {
    /// Build an engine and restore the snapshot at `snapshot_path` if one
    /// exists. Without a path the index lives in memory only.
    pub fn open(
        settings: Settings,
        embedder: Arc<dyn EmbeddingGateway>,
        scorer: Option<Arc<dyn RerankGateway>>,
        snapshot_path: Option<PathBuf>,
    ) -> Result<Self> {
        settings.validate()?;
        if embedder.dimension() != settings.embedding.dimension {
            return Err(Error::InvalidConfig(format!(
                "embedder produces {}-d vectors but embedding.dimension is {}",
                embedder.dimension(),
                settings.embedding.dimension
            )));
        }

        let mut index = VectorIndex::new();
        if let Some(path) = &snapshot_path {
            if index.load(path)? {
                if let Some(dim) = index.dimension() {
                    if dim != embedder.dimension() {
                        return Err(Error::DimensionMismatch { expected: embedder.dimension(), actual: dim });
                    }
                }
            }
        }
        tracing::info!(records = index.len(), rerank = scorer.is_some(), "retrieval engine opened");

        Ok(Self {
            chunker: Chunker::new(settings.chunking)?,
            embedder,
            scorer,
            fusion: RankFusion::new(FusionConfig::from(&settings.rerank)),
            settings,
            index: RwLock::new(index),
            snapshot_path,
            dirty: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn snapshot_path(&self) -> Option<&Path> { self.snapshot_path.as_deref() }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> (Vec<Vec<f32>>, Vec<ChunkId>) {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embedded = embed_in_batches(self.embedder.as_ref(), &texts, BatchOptions::from(&self.settings.embedding)).await;
        if embedded.is_degraded() {
            tracing::warn!(degraded = embedded.degraded.len(), of = chunks.len(), "some chunks got zero-vector placeholders");
        }
        let degraded = embedded.degraded.iter().map(|&i| chunks[i].id.clone()).collect();
        (embedded.vectors, degraded)
    }

    /// Chunk, embed and index one document. Chunks left over from an earlier
    /// ingest of the same document id are removed.
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport> {
        let started = Instant::now();
        let chunks = self.chunker.split(document);
        let total_chunks = chunks.len();
        let (vectors, degraded_chunks) = self.embed_chunks(&chunks).await;

        {
            let mut index = self.index.write().await;
            self.commit(&mut index, |staged| {
                staged.upsert_many(chunks, vectors)?;
                let stale: Vec<ChunkId> = staged
                    .chunks()
                    .iter()
                    .filter(|c| c.doc_id == document.id && c.chunk_index >= total_chunks)
                    .map(|c| c.id.clone())
                    .collect();
                for id in &stale {
                    staged.delete(id);
                }
                Ok(())
            })?;
        }

        let report = IngestReport {
            doc_id: document.id.clone(),
            total_chunks,
            indexed_chunks: total_chunks,
            degraded_chunks,
            elapsed: started.elapsed(),
        };
        tracing::info!(doc_id = %report.doc_id, chunks = total_chunks, elapsed_ms = report.elapsed.as_millis() as u64, "document ingested");
        Ok(report)
    }

    pub async fn ingest_text(&self, filename: &str, content: &str, metadata: Meta) -> Result<IngestReport> {
        let document = Document::from_text(filename, content, metadata)?;
        self.ingest(&document).await
    }

    pub async fn query(&self, text: &str, options: QueryOptions) -> Result<QueryResponse> {
        let started = Instant::now();
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("query text is empty".into()));
        }
        let top_k = options.top_k.unwrap_or(self.settings.search.top_k);
        if top_k == 0 {
            return Err(Error::InvalidInput("top_k must be greater than 0".into()));
        }
        if self.index.read().await.is_empty() {
            return Err(Error::NotInitialized);
        }

        let query_vec = self.embedder.embed_one(text).await?;
        if query_vec.len() != self.embedder.dimension() {
            return Err(Error::MalformedUpstreamResponse(format!(
                "query embedding of length {} where {} was expected",
                query_vec.len(),
                self.embedder.dimension()
            )));
        }
        let fetch = top_k.saturating_mul(self.settings.search.candidate_multiplier);
        let floor = options.similarity_floor.or(self.settings.search.similarity_floor);
        let candidates = self.index.read().await.search(&query_vec, fetch, floor)?;
        let candidate_count = candidates.len();

        let rerank = options.rerank.unwrap_or(self.settings.rerank.enabled);
        let scorer = if rerank { self.scorer.as_deref() } else { None };
        let outcome = self.fusion.fuse(text, candidates, scorer, top_k).await;

        let response = QueryResponse {
            query: text.to_string(),
            results: outcome.results,
            candidates: candidate_count,
            fused: outcome.applied,
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            results = response.results.len(),
            candidates = candidate_count,
            fused = response.fused,
            elapsed_ms = response.elapsed.as_millis() as u64,
            "query answered"
        );
        Ok(response)
    }

    pub async fn get_chunk(&self, chunk_id: &str) -> Option<Chunk> {
        self.index.read().await.get(chunk_id).cloned()
    }

    pub async fn similar(&self, chunk_id: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.index.read().await.similar_to(chunk_id, k)
    }

    /// Remove every chunk of `doc_id`. Returns how many were removed.
    pub async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let mut index = self.index.write().await;
        if !index.chunks().iter().any(|c| c.doc_id == doc_id) {
            return Ok(0);
        }
        let removed = self.commit(&mut index, |staged| Ok(staged.delete_document(doc_id)))?;
        tracing::info!(doc_id, removed, "document deleted");
        Ok(removed)
    }

    pub async fn delete_chunk(&self, chunk_id: &str) -> Result<bool> {
        let mut index = self.index.write().await;
        if !index.contains(chunk_id) {
            return Ok(false);
        }
        self.commit(&mut index, |staged| Ok(staged.delete(chunk_id)))
    }

    /// Re-embed a complete chunk set and swap it in for the current index.
    /// The old index stays in place if building the new one fails.
    pub async fn rebuild(&self, chunks: Vec<Chunk>) -> Result<RebuildReport> {
        let started = Instant::now();
        let (vectors, degraded_chunks) = self.embed_chunks(&chunks).await;
        let fresh = VectorIndex::create(chunks, vectors)?;
        let indexed_chunks = fresh.len();

        let mut index = self.index.write().await;
        self.install(&mut index, fresh)?;
        drop(index);

        let report = RebuildReport { indexed_chunks, degraded_chunks, elapsed: started.elapsed() };
        tracing::info!(chunks = indexed_chunks, degraded = report.degraded_chunks.len(), "index rebuilt");
        Ok(report)
    }

    pub async fn stats(&self) -> IndexStats {
        self.index.read().await.stats()
    }

    /// Drop every record and remove the snapshot file.
    pub async fn reset(&self) -> Result<()> {
        let mut index = self.index.write().await;
        match &self.snapshot_path {
            Some(path) => index.reset(path)?,
            None => index.clear(),
        }
        self.dirty.store(false, Ordering::SeqCst);
        tracing::info!("index reset");
        Ok(())
    }

    /// Persist the index now. Returns `false` when the engine has no snapshot path.
    pub async fn save(&self) -> Result<bool> {
        let index = self.index.read().await;
        self.persist(&index)
    }

    /// Persist unsaved changes and shut down.
    pub async fn close(self) -> Result<()> {
        if self.dirty.load(Ordering::SeqCst) {
            let index = self.index.read().await;
            self.persist(&index)?;
        }
        tracing::info!("retrieval engine closed");
        Ok(())
    }

    fn autosaves(&self) -> bool {
        self.settings.index.autosave && self.snapshot_path.is_some()
    }

    /// Apply `change` and autosave. When the save fails the index is left as it was.
    fn commit<T>(&self, index: &mut VectorIndex, change: impl FnOnce(&mut VectorIndex) -> Result<T>) -> Result<T> {
        if !self.autosaves() {
            let out = change(index)?;
            self.dirty.store(true, Ordering::SeqCst);
            return Ok(out);
        }
        let mut staged = index.clone();
        let out = change(&mut staged)?;
        self.install(index, staged)?;
        Ok(out)
    }

    /// Swap in `next`, writing it to the snapshot first when autosave is on.
    fn install(&self, index: &mut VectorIndex, next: VectorIndex) -> Result<()> {
        if self.autosaves() {
            self.persist(&next)?;
        } else {
            self.dirty.store(true, Ordering::SeqCst);
        }
        *index = next;
        Ok(())
    }

    fn persist(&self, index: &VectorIndex) -> Result<bool> {
        let Some(path) = &self.snapshot_path else {
            return Ok(false);
        };
        index.save(path)?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(true)
    }
}
