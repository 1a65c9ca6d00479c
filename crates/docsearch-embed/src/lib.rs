//! Embedding side of the pipeline: an offline hashing embedder, batched
//! embedding with zero-vector fallback, and the secondary relevance scorers
//! used by rank fusion.

pub mod batch;
pub mod hashing;
pub mod relevance;

pub use batch::{embed_in_batches, BatchOptions, EmbeddedBatch};
pub use hashing::HashingEmbedder;
pub use relevance::{EmbeddingRelevanceScorer, KeywordRelevanceScorer};
