//! Top-K reviewer lookup over the similarity index.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use revmatch_core::error::Result;
use revmatch_core::types::Recommendation;

use crate::index::normalize;
use crate::manager::{IndexManager, IndexSnapshot};

/// Answers top-K queries against the index held by an [`IndexManager`].
#[derive(Debug)]
pub struct QueryEngine {
    manager: Arc<IndexManager>,
    dropped_hits: AtomicU64,
}

impl QueryEngine {
    pub fn new(manager: Arc<IndexManager>) -> Self {
        Self {
            manager,
            dropped_hits: AtomicU64::new(0),
        }
    }

    pub fn manager(&self) -> &IndexManager {
        &self.manager
    }

    /// The current index, loading or building it as needed.
    pub fn snapshot(&self) -> Result<IndexSnapshot> {
        self.manager.load_or_build()
    }

    /// Return up to `k` reviewers most similar to `query`, best first.
    ///
    /// An empty index yields an empty result, not an error.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<Recommendation>> {
        let snapshot = self.snapshot()?;
        self.rank(&snapshot, query, k)
    }

    /// Rank `query` against an already loaded snapshot.
    pub fn rank(
        &self,
        snapshot: &IndexSnapshot,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<Recommendation>> {
        if snapshot.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query = normalize(query);
        let hits = snapshot.index().search(&query, k)?;
        let names = snapshot.names();

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match names.get(hit.position) {
                Some(name) => results.push(Recommendation::new(name.clone(), hit.score)),
                None => {
                    // Index and name map disagree; should be unreachable.
                    self.dropped_hits.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        position = hit.position,
                        names = names.len(),
                        "Search hit outside the name map, dropped"
                    );
                }
            }
        }

        debug!(k, returned = results.len(), "Top-K query answered");
        Ok(results)
    }

    /// Number of search hits dropped because they fell outside the name map.
    pub fn dropped_hits(&self) -> u64 {
        self.dropped_hits.load(Ordering::Relaxed)
    }
}
