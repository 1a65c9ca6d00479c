use std::fs;
use std::path::{Path, PathBuf};

use crate::document::{Document, SourceKind};
use crate::error::{Error, Result};
use crate::types::Meta;

pub const DEFAULT_EXTENSIONS: [&str; 3] = ["txt", "md", "rst"];

/// Loads plain-text documents from disk.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    extensions: Vec<String>,
}

impl Default for DocumentSource {
    fn default() -> Self {
        Self { extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect() }
    }
}

impl DocumentSource {
    pub fn new() -> Self { Self::default() }

    pub fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Read one file into a [`Document`]. Invalid UTF-8 is replaced rather than rejected.
    pub fn load_file(&self, path: &Path) -> Result<Document> {
        if !path.is_file() {
            return Err(Error::NotFound(format!("file {}", path.display())));
        }
        if !self.supports(path) {
            return Err(Error::InvalidInput(format!(
                "unsupported file type: {} (expected one of {})",
                path.display(),
                self.extensions.join(", ")
            )));
        }
        let content = read_lossy(path)?;
        let filename = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        Document::build(&filename, &path.to_string_lossy(), content, SourceKind::File, Meta::new())
    }

    /// Load every supported file under `root`, sorted by path. Empty or
    /// unreadable files are skipped with a warning. A missing root yields no
    /// documents.
    pub fn load_directory(&self, root: &Path, limit: Option<usize>) -> Result<Vec<Document>> {
        let mut files = self.list_files(root);
        if files.is_empty() {
            tracing::info!(root = %root.display(), "no supported files found");
            return Ok(vec![]);
        }
        if let Some(limit) = limit {
            files.truncate(limit);
        }

        let mut documents = Vec::with_capacity(files.len());
        for (i, path) in files.iter().enumerate() {
            tracing::debug!(file = %path.display(), "loading {}/{}", i + 1, files.len());
            match self.load_file(path) {
                Ok(mut doc) => {
                    doc.metadata.insert("category".into(), category_from_path(path, root).into());
                    documents.push(doc);
                }
                Err(e) => tracing::warn!(file = %path.display(), "skipping unreadable file: {e}"),
            }
        }
        tracing::info!(files = files.len(), documents = documents.len(), "loaded documents");
        Ok(documents)
    }

    pub fn list_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.supports(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        files
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}

/// Parent directory relative to `root`, or `misc` for files at the top level.
fn category_from_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .parent()
        .and_then(|p| p.to_str())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "misc".to_string())
}
