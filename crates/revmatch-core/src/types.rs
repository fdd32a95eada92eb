use serde::{Deserialize, Serialize};

/// Output dimension of all-MiniLM-L6-v2, the default embedding model.
pub const EMBEDDING_DIM: usize = 384;

// =============================================================================
// Reviewer data
// =============================================================================

/// A reviewer identity paired with the raw (unnormalized) embedding of their
/// prior work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewerRecord {
    /// Unique reviewer name.
    pub name: String,
    /// Raw embedding as produced by the embedding model.
    pub embedding: Vec<f32>,
}

impl ReviewerRecord {
    pub fn new(name: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            embedding,
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

// =============================================================================
// Query results
// =============================================================================

/// One entry of a top-K reviewer recommendation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Reviewer name from the name map.
    pub name: String,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
}

impl Recommendation {
    pub fn new(name: impl Into<String>, score: f32) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}
