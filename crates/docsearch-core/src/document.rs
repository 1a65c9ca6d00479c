//! Source documents and the metadata derived when they are created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Meta, MetaValue};

/// Where a document's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Text,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Text => "text",
        }
    }
}

/// An ingested document. Immutable once created; chunks are derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: Meta,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Build a document from already-read text. `extra` is merged over the
    /// derived metadata, so callers can override any derived key.
    pub fn from_text(filename: &str, content: impl Into<String>, extra: Meta) -> Result<Self> {
        Self::build(filename, filename, content.into(), SourceKind::Text, extra)
    }

    pub(crate) fn build(filename: &str, file_path: &str, content: String, source: SourceKind, extra: Meta) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(Error::InvalidInput(format!("document '{filename}' has no content")));
        }
        let created_at = Utc::now();
        let id = generate_doc_id(&content, created_at);

        let mut metadata = Meta::new();
        metadata.insert("filename".into(), filename.into());
        metadata.insert("file_path".into(), file_path.into());
        metadata.insert("file_size".into(), content.len().into());
        metadata.insert("char_count".into(), content.chars().count().into());
        metadata.insert("word_count".into(), content.split_whitespace().count().into());
        metadata.insert("token_count".into(), estimate_tokens(&content).into());
        metadata.insert("source".into(), source.as_str().into());
        metadata.extend(extra);

        Ok(Self { id, content, metadata, created_at })
    }

    /// Replace the generated id, e.g. when the document repository already assigned one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn filename(&self) -> Option<&str> {
        self.metadata.get("filename").and_then(MetaValue::as_str)
    }
}

/// `doc_{unix_seconds}_{hash8}` where `hash8` is the first 8 hex digits of
/// the blake3 hash of the content.
pub fn generate_doc_id(content: &str, created_at: DateTime<Utc>) -> String {
    let hash = blake3::hash(content.as_bytes()).to_hex().to_string();
    format!("doc_{}_{}", created_at.timestamp(), &hash[..8])
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Rough token estimate: CJK ideographs and ASCII words count one token
/// each, every other char counts half. Never below 1 for non-empty text.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let total = text.chars().count();
    let cjk = text.chars().filter(|c| is_cjk(*c)).count();

    let mut words = 0usize;
    let mut word_chars = 0usize;
    for run in text.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        if !run.is_empty() && run.chars().all(|c| c.is_ascii_alphabetic()) {
            words += 1;
            word_chars += run.len();
        }
    }

    let other = total.saturating_sub(cjk + word_chars);
    (cjk + words + other / 2).max(1)
}
