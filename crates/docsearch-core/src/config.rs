//! Layered configuration and path helpers.
//!
//! Figment merges `config.toml`, then `config.<env>.toml` (env taken from
//! `RUST_ENV`, default `dev`), then `APP_*` environment variables, where `__`
//! separates nested keys (`APP_CHUNKING__CHUNK_SIZE=800`).
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current directory using `RUST_ENV`.
    pub fn load() -> Result<Self> {
        let base = env::current_dir()?;
        let env_name = env::var("RUST_ENV").ok();
        Self::load_for_env(&base, env_name.as_deref())
    }

    pub fn load_for_env(base_dir: &Path, env_name: Option<&str>) -> Result<Self> {
        let env_name = env_name.unwrap_or("dev");
        let mut figment = Figment::new().merge(Toml::file(base_dir.join("config.toml")));
        let overlay = match env_name {
            "dev" | "development" => Some("config.dev.toml"),
            "prod" | "production" => Some("config.prod.toml"),
            "test" | "testing" => Some("config.test.toml"),
            _ => None,
        };
        if let Some(file) = overlay {
            figment = figment.merge(Toml::file(base_dir.join(file)));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        tracing::debug!(env = env_name, base = %base_dir.display(), "configuration loaded");
        Ok(Self { figment, base_dir: base_dir.to_path_buf() })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// The typed, validated view of the whole configuration. Missing
    /// sections and keys take their defaults.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to read settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn snapshot_path(&self, settings: &Settings) -> PathBuf {
        resolve_with_base(&self.base_dir, &settings.index.snapshot_path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub rerank: RerankSettings,
    pub index: IndexSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be greater than 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be greater than 0".into()));
        }
        if self.search.top_k == 0 {
            return Err(Error::InvalidConfig("search.top_k must be greater than 0".into()));
        }
        if self.search.candidate_multiplier == 0 {
            return Err(Error::InvalidConfig("search.candidate_multiplier must be greater than 0".into()));
        }
        if self.rerank.vector_weight < 0.0 || self.rerank.relevance_weight < 0.0 {
            return Err(Error::InvalidConfig("rerank weights must be non-negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub dimension: usize,
    pub batch_size: usize,
    /// Pause between consecutive batches, for upstream rate limits.
    pub batch_pause_ms: u64,
    pub retry_failed_batches: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { dimension: 1536, batch_size: 10, batch_pause_ms: 100, retry_failed_batches: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub top_k: usize,
    /// Candidates fetched from the index per requested result when fusion runs.
    pub candidate_multiplier: usize,
    pub similarity_floor: Option<f32>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { top_k: 5, candidate_multiplier: 2, similarity_floor: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    Embedding,
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub enabled: bool,
    pub scorer: ScorerKind,
    pub vector_weight: f32,
    pub relevance_weight: f32,
    pub steepness: f32,
    pub midpoint: f32,
    pub max_candidate_chars: usize,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            scorer: ScorerKind::Embedding,
            vector_weight: 0.3,
            relevance_weight: 0.7,
            steepness: 10.0,
            midpoint: 0.5,
            max_candidate_chars: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub snapshot_path: String,
    /// Save after every mutating orchestrator call.
    pub autosave: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { snapshot_path: "data/vector_index.json".into(), autosave: true }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
