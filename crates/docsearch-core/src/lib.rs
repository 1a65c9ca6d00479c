//! Shared building blocks of the docsearch retrieval pipeline: documents and
//! chunks, the structure-aware chunker, gateway traits, configuration and the
//! common error type.

pub mod chunker;
pub mod config;
pub mod document;
pub mod error;
pub mod similarity;
pub mod source;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig};
pub use config::{Config, Settings};
pub use document::Document;
pub use error::{Error, Result};
pub use traits::{EmbeddingGateway, RerankGateway};
pub use types::{Chunk, ChunkId, ChunkKind, Meta, MetaValue, SearchResult, Section};
