//! Domain types shared by the chunker, the vector index and the fusion stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type ChunkId = String;
pub type Meta = BTreeMap<String, MetaValue>;

/// A single metadata value. Metadata maps stay open-ended, but values are
/// tagged so consumers never deal with untyped data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(b) => write!(f, "{b}"),
            MetaValue::Int(i) => write!(f, "{i}"),
            MetaValue::Float(x) => write!(f, "{x}"),
            MetaValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self { MetaValue::Str(v.to_string()) }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self { MetaValue::Str(v) }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self { MetaValue::Int(v) }
}

impl From<usize> for MetaValue {
    fn from(v: usize) -> Self { MetaValue::Int(i64::try_from(v).unwrap_or(i64::MAX)) }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self { MetaValue::Float(v) }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self { MetaValue::Bool(v) }
}

/// Structural classification of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// The document was small enough to be kept whole.
    CompleteDocument,
    Heading,
    Table,
    List,
    Paragraph,
    Text,
}

impl ChunkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkKind::CompleteDocument => "complete_document",
            ChunkKind::Heading => "heading",
            ChunkKind::Table => "table",
            ChunkKind::List => "list",
            ChunkKind::Paragraph => "paragraph",
            ChunkKind::Text => "text",
        }
    }
}

/// The nearest enclosing markdown heading of a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub level: u8,
    pub title: String,
}

/// A span of a source document that is independently embedded and indexed.
///
/// - `id`: `{doc_id}_chunk_{chunk_index}`, unique within an index
/// - `text`: trimmed span content
/// - `chunk_index`/`total_chunks`: position within the parent document
/// - `kind`/`section`: structure detected while splitting
/// - `metadata`: the parent document's metadata, inherited verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub kind: ChunkKind,
    #[serde(default)]
    pub section: Option<Section>,
    pub line_count: usize,
    #[serde(default)]
    pub metadata: Meta,
}

impl Chunk {
    pub fn make_id(doc_id: &str, chunk_index: usize) -> ChunkId {
        format!("{doc_id}_chunk_{chunk_index}")
    }

    /// Length of the chunk text in chars.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk matched by a query.
///
/// `similarity` is the cosine similarity from the vector index. `relevance`
/// and `combined` are only set once rank fusion scored the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub similarity: f32,
    pub relevance: Option<f32>,
    pub combined: Option<f32>,
}

impl SearchResult {
    pub fn new(chunk: Chunk, similarity: f32) -> Self {
        Self { chunk, similarity, relevance: None, combined: None }
    }

    /// Copy of this result carrying fusion scores.
    pub fn fused(&self, relevance: Option<f32>, combined: f32) -> Self {
        Self { chunk: self.chunk.clone(), similarity: self.similarity, relevance, combined: Some(combined) }
    }

    pub fn id(&self) -> &str {
        &self.chunk.id
    }

    /// The score the result is ranked by: combined when fused, similarity otherwise.
    pub fn score(&self) -> f32 {
        self.combined.unwrap_or(self.similarity)
    }
}
