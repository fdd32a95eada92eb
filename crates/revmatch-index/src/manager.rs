//! Index lifecycle: build, load-or-build, incremental add, delete-and-rebuild.
//!
//! The persisted index and name map are a cache derived from the
//! [`EmbeddingStore`]. Only [`IndexManager::build`] establishes the
//! position-to-name correspondence from scratch; every other operation
//! preserves it.
//!
//! There is no locking. Two processes mutating the same files concurrently
//! can lose an update (both read the same base index and the last writer
//! wins). Each file is replaced atomically, but the index and the name map
//! are two separate files, so a reader racing a writer may still see one
//! updated and the other not; that surfaces as [`RevmatchError::CorruptState`]
//! on load rather than as misattributed results.

use std::path::Path;

use tracing::{debug, info, warn};

use revmatch_core::config::IndexPaths;
use revmatch_core::error::{Result, RevmatchError};

use crate::index::{normalize, normalize_in_place, FlatIpIndex};
use crate::persist;
use crate::store::{EmbeddingMap, EmbeddingStore};

/// An index paired with its name map. `names[i]` is the reviewer stored at
/// row `i`; the two always have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    index: FlatIpIndex,
    names: Vec<String>,
}

impl IndexSnapshot {
    /// Pair an index with its name map, rejecting a length mismatch.
    pub fn new(index: FlatIpIndex, names: Vec<String>) -> Result<Self> {
        if index.len() != names.len() {
            return Err(RevmatchError::CorruptState(format!(
                "index holds {} rows but name map lists {} reviewers",
                index.len(),
                names.len()
            )));
        }
        Ok(Self { index, names })
    }

    pub fn empty(dim: usize) -> Self {
        Self {
            index: FlatIpIndex::new(dim),
            names: Vec::new(),
        }
    }

    pub fn index(&self) -> &FlatIpIndex {
        &self.index
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }

    pub fn into_parts(self) -> (FlatIpIndex, Vec<String>) {
        (self.index, self.names)
    }

    fn push(&mut self, name: &str, row: &[f32]) -> Result<()> {
        self.index.add(row)?;
        self.names.push(name.to_string());
        Ok(())
    }

    /// Skip the length check, for exercising desync handling in tests.
    #[cfg(test)]
    pub(crate) fn new_unchecked(index: FlatIpIndex, names: Vec<String>) -> Self {
        Self { index, names }
    }
}

/// Owns the embedding store and the persisted index/name-map pair.
#[derive(Debug, Clone)]
pub struct IndexManager {
    paths: IndexPaths,
    store: EmbeddingStore,
    dim: usize,
}

impl IndexManager {
    /// `dim` is the dimension used for an index built from an empty store.
    /// A non-empty store determines its own dimension.
    pub fn new(paths: IndexPaths, dim: usize) -> Self {
        let store = EmbeddingStore::new(paths.embedding_store.clone());
        Self { paths, store, dim }
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Whether both the index file and the name map file exist.
    pub fn is_persisted(&self) -> bool {
        self.paths.index.exists() && self.paths.name_map.exists()
    }

    /// Rebuild the index from the embedding store and persist it.
    ///
    /// An empty or missing store yields an empty snapshot and removes any
    /// previously persisted index, returning to the absent state.
    pub fn build(&self) -> Result<IndexSnapshot> {
        let records = self.store.records()?;

        if records.is_empty() {
            let removed_index = persist::remove_if_exists(&self.paths.index)?;
            let removed_names = persist::remove_if_exists(&self.paths.name_map)?;
            if removed_index || removed_names {
                info!("Embedding store is empty, removed stale index files");
            } else {
                debug!("Embedding store is empty, nothing to index");
            }
            return Ok(IndexSnapshot::empty(self.dim));
        }

        let dim = records[0].dimension();
        if dim != self.dim {
            warn!(
                stored = dim,
                configured = self.dim,
                "Stored embeddings differ from the configured dimension"
            );
        }

        let mut snapshot = IndexSnapshot::empty(dim);
        for record in &records {
            if record.dimension() != dim {
                return Err(RevmatchError::CorruptState(format!(
                    "reviewer '{}' has dimension {}, expected {}",
                    record.name,
                    record.dimension(),
                    dim
                )));
            }
            snapshot.push(&record.name, &normalize(&record.embedding))?;
        }

        self.persist(&snapshot)?;
        info!(reviewers = snapshot.len(), dim, "Similarity index built");
        Ok(snapshot)
    }

    /// Load the persisted index and name map, or `None` if either is missing.
    ///
    /// The pair is trusted as-is and not compared against the store.
    pub fn load(&self) -> Result<Option<IndexSnapshot>> {
        if !self.is_persisted() {
            return Ok(None);
        }

        let index = FlatIpIndex::load(&self.paths.index)?;
        let names = read_name_map(&self.paths.name_map)?.unwrap_or_default();
        let snapshot = IndexSnapshot::new(index, names)?;
        debug!(reviewers = snapshot.len(), "Similarity index loaded");
        Ok(Some(snapshot))
    }

    /// Load the persisted index, building it from the store if absent.
    pub fn load_or_build(&self) -> Result<IndexSnapshot> {
        match self.load()? {
            Some(snapshot) => Ok(snapshot),
            None => self.build(),
        }
    }

    /// Append one reviewer to the index without rebuilding.
    ///
    /// The caller is expected to have stored the raw vector with
    /// [`EmbeddingStore::put`] already; the index receives the normalized
    /// copy. Names are not deduplicated: adding a name that is already
    /// indexed creates a second row for it.
    pub fn add_reviewer(&self, name: &str, embedding: &[f32]) -> Result<()> {
        let mut snapshot = self.load_or_build()?;

        let mut row = embedding.to_vec();
        normalize_in_place(&mut row);
        snapshot.push(name, &row)?;

        self.persist(&snapshot)?;
        info!(reviewer = name, reviewers = snapshot.len(), "Reviewer appended to index");
        Ok(())
    }

    /// Remove a reviewer from the store and rebuild the index.
    ///
    /// No-op, returning `false`, when no index is persisted or the name map
    /// does not list `name`. The flat index cannot drop rows in place, so a
    /// full rebuild keeps positions and names aligned.
    pub fn delete_reviewer(&self, name: &str) -> Result<bool> {
        if !self.is_persisted() {
            debug!(reviewer = name, "No persisted index, delete is a no-op");
            return Ok(false);
        }

        let names = read_name_map(&self.paths.name_map)?.unwrap_or_default();
        if !names.iter().any(|n| n == name) {
            debug!(reviewer = name, "Reviewer not indexed, delete is a no-op");
            return Ok(false);
        }

        self.store.remove(name)?;
        let snapshot = self.build()?;
        info!(reviewer = name, reviewers = snapshot.len(), "Reviewer deleted, index rebuilt");
        Ok(true)
    }

    /// Store a reviewer's raw embedding and index it.
    ///
    /// With no persisted index the store is built from scratch, which
    /// already covers the new reviewer; appending on top of that build would
    /// index the reviewer twice.
    pub fn register_reviewer(&self, name: &str, embedding: Vec<f32>) -> Result<()> {
        if self.is_persisted() {
            self.store.put(name, embedding.clone())?;
            self.add_reviewer(name, &embedding)
        } else {
            self.store.put(name, embedding)?;
            self.build().map(|_| ())
        }
    }

    /// Replace the whole embedding store with `map` and rebuild the index.
    ///
    /// An empty `map` is rejected and leaves the store untouched; clearing
    /// every reviewer goes through [`IndexManager::unregister_reviewer`].
    pub fn replace_store(&self, map: &EmbeddingMap) -> Result<IndexSnapshot> {
        if map.is_empty() {
            return Err(RevmatchError::InvalidInput(
                "refusing to replace the embedding store with an empty mapping".to_string(),
            ));
        }

        self.store.save(map)?;
        let snapshot = self.build()?;
        info!(reviewers = snapshot.len(), "Embedding store replaced, index rebuilt");
        Ok(snapshot)
    }

    /// Remove a reviewer from the store and, if indexed, from the index.
    ///
    /// Returns whether anything was removed from either.
    pub fn unregister_reviewer(&self, name: &str) -> Result<bool> {
        let from_store = self.store.remove(name)?;
        let from_index = self.delete_reviewer(name)?;
        Ok(from_store || from_index)
    }

    fn persist(&self, snapshot: &IndexSnapshot) -> Result<()> {
        snapshot.index().save(&self.paths.index)?;
        persist::write_json(&self.paths.name_map, snapshot.names())
    }
}

/// A name map that fails to parse is corrupt state, like an unreadable index.
fn read_name_map(path: &Path) -> Result<Option<Vec<String>>> {
    persist::read_json(path).map_err(|e| match e {
        RevmatchError::Serialization(msg) => RevmatchError::CorruptState(format!(
            "unreadable name map {}: {}",
            path.display(),
            msg
        )),
        other => other,
    })
}
