//! revmatch index crate - embedding store, similarity index, and reviewer lookup.
//!
//! Keeps a flat inner-product index and its name map in step with the JSON
//! embedding store (build, incremental add, delete with rebuild,
//! load-or-build), answers top-K queries, and wires text extraction and
//! embedding into a recommendation pipeline.

pub mod corpus;
pub mod embedding;
pub mod index;
pub mod manager;
mod persist;
pub mod query;
pub mod recommend;
pub mod store;

pub use corpus::{embed_corpus, ingest_corpus, AuthorCorpus, AuthorPapers};
pub use embedding::{DynEmbeddingService, EmbeddingService, MockEmbedding, OnnxEmbeddingService};
pub use index::{normalize, FlatIpIndex, SearchHit};
pub use manager::{IndexManager, IndexSnapshot};
pub use query::QueryEngine;
pub use recommend::{RecommendOutcome, Recommender};
pub use store::{EmbeddingMap, EmbeddingStore};
