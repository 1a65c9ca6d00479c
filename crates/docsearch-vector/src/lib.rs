//! Flat, exact cosine-similarity index over chunk embeddings, with
//! single-file snapshot persistence.

pub mod index;
pub mod snapshot;

pub use index::{IndexStats, VectorIndex};
pub use snapshot::{Snapshot, SnapshotHeader, SnapshotRecord, FORMAT_VERSION};
