//! Retrieval orchestration: rank fusion of vector similarity with a secondary
//! relevance signal, and the engine tying chunking, embedding and the index
//! together.

pub mod engine;
pub mod fusion;

pub use engine::{IngestReport, QueryOptions, QueryResponse, RebuildReport, RetrievalEngine};
pub use fusion::{FusionConfig, FusionOutcome, RankFusion};
