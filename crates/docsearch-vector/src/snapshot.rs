//! On-disk snapshot format.
//!
//! One JSON document: a header followed by the ordered records. The
//! `chunk_id -> position` lookup is not stored; it is rebuilt on load.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use docsearch_core::{Chunk, Error, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub format_version: u32,
    pub record_count: usize,
    /// 0 for an empty index.
    pub dimension: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub header: SnapshotHeader,
    pub records: Vec<SnapshotRecord>,
}

impl Snapshot {
    /// Check the header against the records. Does not touch the filesystem.
    pub fn validate(&self) -> Result<()> {
        let h = &self.header;
        if h.format_version != FORMAT_VERSION {
            return Err(Error::Corrupt(format!("unsupported format version {}", h.format_version)));
        }
        if h.record_count != self.records.len() {
            return Err(Error::Corrupt(format!(
                "header declares {} records, found {}",
                h.record_count,
                self.records.len()
            )));
        }
        if !self.records.is_empty() && h.dimension == 0 {
            return Err(Error::Corrupt("non-empty snapshot without a vector dimension".into()));
        }
        if let Some(r) = self.records.iter().find(|r| r.vector.len() != h.dimension) {
            return Err(Error::Corrupt(format!(
                "record {} has dimension {}, header says {}",
                r.chunk.id,
                r.vector.len(),
                h.dimension
            )));
        }
        Ok(())
    }

    /// Write atomically: serialize into a temp file next to `path`, then rename over it.
    pub fn write(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, self).map_err(std::io::Error::from)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// `Ok(None)` when `path` does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let file = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Corrupt(format!("{}: {}", path.display(), e)))?;
        snapshot.validate()?;
        Ok(Some(snapshot))
    }
}
