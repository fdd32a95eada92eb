use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, RevmatchError};
use crate::types::EMBEDDING_DIM;

/// Top-level configuration for revmatch.
///
/// Loaded from `~/.revmatch/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevmatchConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl RevmatchConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RevmatchConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RevmatchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Resolve the persisted file locations against the data directory.
    pub fn index_paths(&self) -> IndexPaths {
        self.paths.resolve(&expand_home(&self.general.data_dir))
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the embedding store, index and name map.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.revmatch/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Locations of the persisted files. Relative paths are joined onto
/// `general.data_dir`; absolute paths and `~/` paths are used as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// JSON object: reviewer name -> raw embedding.
    pub embedding_store: String,
    /// Binary flat inner-product index.
    pub index: String,
    /// JSON array: index position -> reviewer name.
    pub name_map: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            embedding_store: "author_embeddings.json".to_string(),
            index: "reviewer_index.bin".to_string(),
            name_map: "reviewer_map.json".to_string(),
        }
    }
}

impl PathsConfig {
    pub fn resolve(&self, data_dir: &Path) -> IndexPaths {
        let join = |p: &str| {
            let expanded = expand_home(p);
            if expanded.is_absolute() {
                expanded
            } else {
                data_dir.join(expanded)
            }
        };
        IndexPaths {
            embedding_store: join(&self.embedding_store),
            index: join(&self.index),
            name_map: join(&self.name_map),
        }
    }
}

/// Resolved file locations, constructed once at startup and handed to the
/// index manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub embedding_store: PathBuf,
    pub index: PathBuf,
    pub name_map: PathBuf,
}

impl IndexPaths {
    /// All three files inside one directory, using the default file names.
    pub fn in_dir(dir: &Path) -> Self {
        PathsConfig::default().resolve(dir)
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of reviewers returned when no K is given.
    pub default_k: usize,
    /// Upper bound accepted for K.
    pub max_k: usize,
    /// Dimension of reviewer and query embeddings.
    pub embedding_dim: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            max_k: 10,
            embedding_dim: EMBEDDING_DIM,
        }
    }
}

impl SearchConfig {
    /// Clamp a requested K into `1..=max_k`.
    pub fn clamp_k(&self, k: Option<usize>) -> usize {
        k.unwrap_or(self.default_k).clamp(1, self.max_k.max(1))
    }
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend: "onnx" or "mock".
    pub backend: String,
    /// Directory containing `model.onnx` and `tokenizer.json`.
    pub model_dir: String,
    /// Model name, informational.
    pub model_name: String,
    /// Tokens beyond this length are truncated.
    pub max_seq_len: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "onnx".to_string(),
            model_dir: "~/.revmatch/models/all-MiniLM-L6-v2".to_string(),
            model_name: "all-MiniLM-L6-v2".to_string(),
            max_seq_len: 256,
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}
