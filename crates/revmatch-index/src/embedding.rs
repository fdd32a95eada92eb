//! Text embedding services.
//!
//! - `OnnxEmbeddingService` runs a sentence-transformer ONNX export (by
//!   default all-MiniLM-L6-v2, 384 dimensions) through ort, tokenizing with
//!   the HuggingFace tokenizers crate.
//! - `MockEmbedding` derives deterministic vectors from a hash of the text.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use revmatch_core::error::{Result, RevmatchError};
use revmatch_core::types::EMBEDDING_DIM;

use crate::index::normalize_in_place;

/// Converts text into a fixed-dimension vector.
///
/// Used for reviewer summaries, corpus papers, and submitted documents alike,
/// so the same model must back all three.
pub trait EmbeddingService: Send + Sync {
    /// Embed `text`. Empty text is an error.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;

    /// Dimension of the vectors produced.
    fn dimensions(&self) -> usize;
}

/// Object-safe form of [`EmbeddingService`], implemented for every
/// `EmbeddingService` so callers can hold a `Box<dyn DynEmbeddingService>`.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>>> + Send + 'a>>;

    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>>> + Send + 'a>> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService
// ---------------------------------------------------------------------------

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// ort::Session is Send + Sync internally (shared inner state behind an Arc).
unsafe impl Send for OnnxModel {}
unsafe impl Sync for OnnxModel {}

/// Sentence-transformer embeddings via ONNX Runtime.
///
/// The model directory must contain `model.onnx` and `tokenizer.json`. The
/// model takes `input_ids`, `attention_mask` and `token_type_ids` and returns
/// token embeddings, which are mean-pooled over the attention mask and
/// L2-normalized.
#[derive(Clone)]
pub struct OnnxEmbeddingService {
    model: Arc<OnnxModel>,
    dimensions: usize,
}

impl std::fmt::Debug for OnnxEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingService")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OnnxEmbeddingService {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`, truncating
    /// inputs to `max_seq_len` tokens.
    pub fn from_directory(model_dir: &Path, max_seq_len: usize) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        for required in [&model_path, &tokenizer_path] {
            if !required.exists() {
                return Err(RevmatchError::Embedding(format!(
                    "missing model file {}",
                    required.display()
                )));
            }
        }

        let session = Session::builder()
            .map_err(|e| RevmatchError::Embedding(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| RevmatchError::Embedding(format!("ONNX set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| RevmatchError::Embedding(format!("ONNX load model: {}", e)))?;

        // Output is [batch, seq_len, hidden]; fall back to MiniLM's width when
        // the hidden size is dynamic.
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .filter(|&d| d > 0)
            .map(|d| d as usize)
            .unwrap_or(EMBEDDING_DIM);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| RevmatchError::Embedding(format!("load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_seq_len,
                ..Default::default()
            }))
            .map_err(|e| RevmatchError::Embedding(format!("configure truncation: {}", e)))?;

        info!(
            model = %model_path.display(),
            dimensions,
            max_seq_len,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            model: Arc::new(OnnxModel {
                session: Mutex::new(session),
                tokenizer,
            }),
            dimensions,
        })
    }
}

impl OnnxModel {
    fn embed_blocking(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| RevmatchError::Embedding(format!("tokenization failed: {}", e)))?;

        let to_i64 = |values: &[u32]| values.iter().map(|&v| v as i64).collect::<Vec<i64>>();
        let ids = to_i64(encoding.get_ids());
        let mask = to_i64(encoding.get_attention_mask());
        let type_ids = to_i64(encoding.get_type_ids());
        let seq_len = ids.len();

        let as_batch = |values: Vec<i64>, label: &str| {
            ndarray::Array2::from_shape_vec((1, seq_len), values)
                .map_err(|e| RevmatchError::Embedding(format!("{} array: {}", label, e)))
        };
        let ids_array = as_batch(ids, "input_ids")?;
        let mask_array = as_batch(mask.clone(), "attention_mask")?;
        let type_array = as_batch(type_ids, "token_type_ids")?;

        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| RevmatchError::Embedding(format!("input_ids tensor: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| RevmatchError::Embedding(format!("attention_mask tensor: {}", e)))?;
        let type_ref = TensorRef::from_array_view(&type_array)
            .map_err(|e| RevmatchError::Embedding(format!("token_type_ids tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| RevmatchError::Embedding(format!("session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| RevmatchError::Embedding(format!("ONNX inference failed: {}", e)))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RevmatchError::Embedding(format!("extract embeddings: {}", e)))?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        let hidden = match dims.last() {
            Some(&d) if dims.len() >= 2 && d > 0 => d as usize,
            _ => {
                return Err(RevmatchError::Embedding(format!(
                    "unexpected output shape {:?}",
                    dims
                )))
            }
        };

        let mut pooled = mean_pool(data, &mask, hidden);
        normalize_in_place(&mut pooled);
        debug!(tokens = seq_len, "Text embedded");
        Ok(pooled)
    }
}

impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RevmatchError::Embedding("cannot embed empty text".to_string()));
        }

        // Inference is CPU-bound.
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || model.embed_blocking(&text))
            .await
            .map_err(|e| RevmatchError::Embedding(format!("embedding task panicked: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Average the token embeddings whose attention mask is set.
///
/// `tokens` is a flattened `[seq_len, hidden]` matrix. Returns a zero vector
/// when no token is attended.
pub fn mean_pool(tokens: &[f32], mask: &[i64], hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut count = 0usize;

    for (token, row) in mask.iter().zip(tokens.chunks_exact(hidden)) {
        if *token > 0 {
            for (acc, value) in pooled.iter_mut().zip(row) {
                *acc += value;
            }
            count += 1;
        }
    }

    if count > 0 {
        let count = count as f32;
        for acc in &mut pooled {
            *acc /= count;
        }
    }
    pooled
}

// ---------------------------------------------------------------------------
// MockEmbedding
// ---------------------------------------------------------------------------

/// Deterministic hash-derived embeddings for tests and offline runs.
///
/// Identical inputs always yield identical vectors; the values are not
/// normalized, matching a raw model output.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self::with_dimensions(EMBEDDING_DIM)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        (0..self.dimensions)
            .map(|i| {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                i.hash(&mut hasher);
                let h = hasher.finish();
                (((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0) as f32
            })
            .collect()
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RevmatchError::Embedding("cannot embed empty text".to_string()));
        }
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
