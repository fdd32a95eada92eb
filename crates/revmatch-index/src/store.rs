//! JSON-backed embedding store: reviewer name -> raw embedding.
//!
//! The store is the source of truth for reviewer data. Every mutation is a
//! full load-modify-save cycle; the file keeps insertion order so that a
//! rebuilt index lists reviewers in the order they were added.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info};

use revmatch_core::error::{Result, RevmatchError};
use revmatch_core::types::ReviewerRecord;

use crate::persist;

/// Insertion-ordered mapping of reviewer name to raw embedding.
pub type EmbeddingMap = IndexMap<String, Vec<f32>>;

/// Persisted reviewer embeddings.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    path: PathBuf,
}

impl EmbeddingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted mapping. A missing file is an empty store.
    pub fn load(&self) -> Result<EmbeddingMap> {
        Ok(persist::read_json(&self.path)?.unwrap_or_default())
    }

    /// Replace the persisted mapping with `map`.
    pub fn save(&self, map: &EmbeddingMap) -> Result<()> {
        persist::write_json(&self.path, map)?;
        debug!(path = %self.path.display(), reviewers = map.len(), "Embedding store saved");
        Ok(())
    }

    /// Insert or overwrite a reviewer. Last write wins; an overwritten
    /// reviewer keeps its position.
    pub fn put(&self, name: &str, embedding: Vec<f32>) -> Result<()> {
        if embedding.is_empty() {
            return Err(RevmatchError::InvalidInput(format!(
                "empty embedding for reviewer '{}'",
                name
            )));
        }

        let mut map = self.load()?;
        if let Some((_, existing)) = map.iter().find(|(other, _)| other.as_str() != name) {
            if existing.len() != embedding.len() {
                return Err(RevmatchError::DimensionMismatch {
                    expected: existing.len(),
                    actual: embedding.len(),
                });
            }
        }

        map.insert(name.to_string(), embedding);
        self.save(&map)?;
        info!(reviewer = name, total = map.len(), "Reviewer stored");
        Ok(())
    }

    /// Remove a reviewer. Returns `false` (and leaves the file untouched) if
    /// the reviewer was not present.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut map = self.load()?;
        if map.shift_remove(name).is_none() {
            debug!(reviewer = name, "Reviewer not in store, nothing to remove");
            return Ok(false);
        }
        self.save(&map)?;
        info!(reviewer = name, total = map.len(), "Reviewer removed from store");
        Ok(true)
    }

    /// Reviewer names in store order.
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    /// All reviewers in store order.
    pub fn records(&self) -> Result<Vec<ReviewerRecord>> {
        Ok(self
            .load()?
            .into_iter()
            .map(|(name, embedding)| ReviewerRecord { name, embedding })
            .collect())
    }
}
