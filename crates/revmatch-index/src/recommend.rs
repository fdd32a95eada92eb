//! Reviewer recommendation pipeline.
//!
//! `Recommender` ties a text extractor and an embedding service to the
//! query engine: document -> text -> embedding -> top-K reviewers. It also
//! registers new reviewers from a free-text research summary.

use std::path::Path;

use tracing::{debug, info};

use revmatch_core::error::{Result, RevmatchError};
use revmatch_core::types::Recommendation;
use revmatch_extract::{DynTextExtractor, TextExtractor};

use crate::embedding::{DynEmbeddingService, EmbeddingService};
use crate::query::QueryEngine;

/// Result of a recommendation request.
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendOutcome {
    /// The document yielded no text; nothing was embedded.
    NoText,
    /// The index holds no reviewers.
    NoCandidates,
    /// Best-first matches, at most K of them.
    Matches(Vec<Recommendation>),
}

impl RecommendOutcome {
    /// Flatten to a result list; both empty outcomes become `[]`.
    pub fn into_results(self) -> Vec<Recommendation> {
        match self {
            RecommendOutcome::Matches(results) => results,
            RecommendOutcome::NoText | RecommendOutcome::NoCandidates => Vec::new(),
        }
    }
}

/// Recommends reviewers for submitted documents.
pub struct Recommender {
    engine: QueryEngine,
    extractor: Box<dyn DynTextExtractor>,
    embedder: Box<dyn DynEmbeddingService>,
}

impl Recommender {
    pub fn new(
        engine: QueryEngine,
        extractor: impl TextExtractor + 'static,
        embedder: impl EmbeddingService + 'static,
    ) -> Self {
        Self {
            engine,
            extractor: Box::new(extractor),
            embedder: Box::new(embedder),
        }
    }

    /// Create from pre-boxed collaborators.
    pub fn new_dyn(
        engine: QueryEngine,
        extractor: Box<dyn DynTextExtractor>,
        embedder: Box<dyn DynEmbeddingService>,
    ) -> Self {
        Self {
            engine,
            extractor,
            embedder,
        }
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    /// Recommend up to `k` reviewers for the document at `path`.
    pub async fn recommend(&self, path: &Path, k: usize) -> Result<RecommendOutcome> {
        let text = self.extractor.extract_text_boxed(path).await?;
        if text.trim().is_empty() {
            info!(document = %path.display(), "No text extracted, nothing to match");
            return Ok(RecommendOutcome::NoText);
        }
        self.recommend_text(&text, k).await
    }

    /// Recommend up to `k` reviewers for already extracted text.
    pub async fn recommend_text(&self, text: &str, k: usize) -> Result<RecommendOutcome> {
        if text.trim().is_empty() {
            return Ok(RecommendOutcome::NoText);
        }

        let snapshot = self.engine.snapshot()?;
        if snapshot.is_empty() {
            info!("No reviewer embeddings indexed");
            return Ok(RecommendOutcome::NoCandidates);
        }

        let query = self.embedder.embed_boxed(text).await?;
        let results = self.engine.rank(&snapshot, &query, k)?;
        debug!(k, matches = results.len(), "Recommendation computed");
        Ok(RecommendOutcome::Matches(results))
    }

    /// Embed a reviewer's research summary, store it, and index it.
    pub async fn add_reviewer_from_text(&self, name: &str, summary: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RevmatchError::InvalidInput(
                "reviewer name must not be blank".to_string(),
            ));
        }
        if summary.trim().is_empty() {
            return Err(RevmatchError::InvalidInput(
                "reviewer summary must not be blank".to_string(),
            ));
        }

        let embedding = self.embedder.embed_boxed(summary).await?;
        self.engine.manager().register_reviewer(name, embedding)?;
        info!(reviewer = name, "Reviewer added");
        Ok(())
    }
}
