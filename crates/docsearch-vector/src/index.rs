use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use docsearch_core::similarity::cosine_similarity;
use docsearch_core::{Chunk, ChunkId, Error, Result, SearchResult};
use serde::{Deserialize, Serialize};

use crate::snapshot::{Snapshot, SnapshotHeader, SnapshotRecord, FORMAT_VERSION};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub initialized: bool,
    pub count: usize,
    pub dimension: Option<usize>,
    /// Vectors at 8 bytes per component plus the chunk text.
    pub approx_size_bytes: usize,
}

/// Exact brute-force index. `chunks[i]` is embedded as `vectors[i]` and
/// `positions[chunks[i].id] == i` holds after every successful mutation.
/// Failed mutations leave the index untouched.
#[derive(Debug, Default, Clone)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    positions: HashMap<ChunkId, usize>,
    dimension: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self { Self::default() }

    /// Build an index from parallel lists. The dimension is taken from the
    /// first vector.
    pub fn create(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(Error::InvalidInput(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        let dimension = vectors.first().map(Vec::len);
        if let Some(dim) = dimension {
            if dim == 0 {
                return Err(Error::InvalidInput("empty vectors cannot be indexed".into()));
            }
            check_vectors(dim, &vectors)?;
        }

        let mut positions = HashMap::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            if positions.insert(chunk.id.clone(), i).is_some() {
                return Err(Error::InvalidInput(format!("duplicate chunk id {}", chunk.id)));
            }
        }
        tracing::debug!(count = chunks.len(), ?dimension, "index created");
        Ok(Self { chunks, vectors, positions, dimension })
    }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn dimension(&self) -> Option<usize> { self.dimension }

    pub fn contains(&self, chunk_id: &str) -> bool { self.positions.contains_key(chunk_id) }

    pub fn get(&self, chunk_id: &str) -> Option<&Chunk> {
        self.positions.get(chunk_id).map(|&i| &self.chunks[i])
    }

    pub fn chunks(&self) -> &[Chunk] { &self.chunks }

    /// Insert or overwrite one record. Returns `true` when the id was new.
    pub fn upsert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<bool> {
        if let Some(dim) = self.expected_dimension() {
            if vector.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, actual: vector.len() });
            }
        }
        if vector.is_empty() {
            return Err(Error::InvalidInput(format!("empty vector for chunk {}", chunk.id)));
        }
        check_finite(std::slice::from_ref(&vector))?;
        self.dimension = Some(vector.len());
        Ok(self.put(chunk, vector))
    }

    /// Upsert many records; all are validated before any is applied.
    /// Returns the number of new ids.
    pub fn upsert_many(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<usize> {
        if chunks.len() != vectors.len() {
            return Err(Error::InvalidInput(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        let Some(first) = vectors.first() else {
            return Ok(0);
        };
        let dim = self.expected_dimension().unwrap_or(first.len());
        if dim == 0 {
            return Err(Error::InvalidInput("empty vectors cannot be indexed".into()));
        }
        check_vectors(dim, &vectors)?;

        self.dimension = Some(dim);
        let mut inserted = 0;
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            if self.put(chunk, vector) {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Dimension new vectors must have. An emptied index accepts any.
    fn expected_dimension(&self) -> Option<usize> {
        if self.is_empty() { None } else { self.dimension }
    }

    fn put(&mut self, chunk: Chunk, vector: Vec<f32>) -> bool {
        match self.positions.get(&chunk.id) {
            Some(&i) => {
                self.chunks[i] = chunk;
                self.vectors[i] = vector;
                false
            }
            None => {
                self.positions.insert(chunk.id.clone(), self.chunks.len());
                self.chunks.push(chunk);
                self.vectors.push(vector);
                true
            }
        }
    }

    /// The `k` most similar records with similarity at or above `floor`, in
    /// descending order. Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize, floor: Option<f32>) -> Result<Vec<SearchResult>> {
        self.search_excluding(query, k, floor, None)
    }

    fn search_excluding(&self, query: &[f32], k: usize, floor: Option<f32>, skip: Option<usize>) -> Result<Vec<SearchResult>> {
        let Some(dim) = self.expected_dimension() else {
            return Ok(Vec::new());
        };
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: query.len() });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let floor = floor.unwrap_or(f32::NEG_INFINITY);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .filter(|(_, s)| *s >= floor)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(i, s)| SearchResult::new(self.chunks[i].clone(), s)).collect())
    }

    /// Records most similar to a stored record, excluding the record itself.
    pub fn similar_to(&self, chunk_id: &str, k: usize) -> Result<Vec<SearchResult>> {
        let &i = self
            .positions
            .get(chunk_id)
            .ok_or_else(|| Error::NotFound(format!("chunk {chunk_id}")))?;
        self.search_excluding(&self.vectors[i], k, None, Some(i))
    }

    /// Remove one record. Returns `false` for an unknown id.
    pub fn delete(&mut self, chunk_id: &str) -> bool {
        let Some(i) = self.positions.remove(chunk_id) else {
            return false;
        };
        self.chunks.remove(i);
        self.vectors.remove(i);
        for chunk in &self.chunks[i..] {
            if let Some(p) = self.positions.get_mut(&chunk.id) {
                *p -= 1;
            }
        }
        self.forget_dimension_if_empty();
        true
    }

    /// Remove every chunk of `doc_id`. Returns how many were removed.
    pub fn delete_document(&mut self, doc_id: &str) -> usize {
        let doomed: HashSet<usize> = self
            .chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.doc_id == doc_id)
            .map(|(i, _)| i)
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        let chunks = std::mem::take(&mut self.chunks);
        let vectors = std::mem::take(&mut self.vectors);
        for (i, (chunk, vector)) in chunks.into_iter().zip(vectors).enumerate() {
            if !doomed.contains(&i) {
                self.chunks.push(chunk);
                self.vectors.push(vector);
            }
        }
        self.rebuild_positions();
        self.forget_dimension_if_empty();
        doomed.len()
    }

    fn rebuild_positions(&mut self) {
        self.positions = self.chunks.iter().enumerate().map(|(i, c)| (c.id.clone(), i)).collect();
    }

    fn forget_dimension_if_empty(&mut self) {
        if self.chunks.is_empty() {
            self.dimension = None;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn stats(&self) -> IndexStats {
        let dim = self.dimension.unwrap_or(0);
        let text: usize = self.chunks.iter().map(|c| c.text.len()).sum();
        IndexStats {
            initialized: !self.is_empty(),
            count: self.len(),
            dimension: self.dimension,
            approx_size_bytes: self.len() * dim * 8 + text,
        }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            header: SnapshotHeader {
                format_version: FORMAT_VERSION,
                record_count: self.len(),
                dimension: self.dimension.unwrap_or(0),
            },
            records: self
                .chunks
                .iter()
                .zip(&self.vectors)
                .map(|(chunk, vector)| SnapshotRecord { chunk: chunk.clone(), vector: vector.clone() })
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        snapshot.validate()?;
        let (chunks, vectors): (Vec<Chunk>, Vec<Vec<f32>>) = snapshot.records.into_iter().map(|r| (r.chunk, r.vector)).unzip();
        Self::create(chunks, vectors).map_err(|e| Error::Corrupt(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_snapshot().write(path)?;
        tracing::info!(path = %path.display(), count = self.len(), "index saved");
        Ok(())
    }

    /// Replace the contents with the snapshot at `path`. Returns `false` and
    /// leaves the index as is when the file does not exist.
    pub fn load(&mut self, path: &Path) -> Result<bool> {
        let Some(snapshot) = Snapshot::read(path)? else {
            tracing::debug!(path = %path.display(), "no snapshot to load");
            return Ok(false);
        };
        *self = Self::from_snapshot(snapshot)?;
        tracing::info!(path = %path.display(), count = self.len(), "index loaded");
        Ok(true)
    }

    /// Clear memory and remove the snapshot at `path` if present.
    pub fn reset(&mut self, path: &Path) -> Result<()> {
        self.clear();
        match fs::remove_file(path) {
            Ok(()) => tracing::info!(path = %path.display(), "snapshot removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

fn check_vectors(dim: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if let Some(v) = vectors.iter().find(|v| v.len() != dim) {
        return Err(Error::DimensionMismatch { expected: dim, actual: v.len() });
    }
    check_finite(vectors)
}

/// NaN and infinities have no JSON form and would make the snapshot unreadable.
fn check_finite(vectors: &[Vec<f32>]) -> Result<()> {
    match vectors.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
        Some(i) => Err(Error::InvalidInput(format!("vector {i} has a non-finite component"))),
        None => Ok(()),
    }
}
