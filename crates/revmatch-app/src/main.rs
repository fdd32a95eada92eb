//! revmatch application binary - composition root.
//!
//! Ties the revmatch crates into a single executable:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Resolve the data directory and persisted file paths
//! 3. Build the index manager, query engine and embedding backend
//! 4. Run one command (recommend, add, remove, rebuild, list, ingest)

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use revmatch_core::config::{expand_home, RevmatchConfig};
use revmatch_core::RevmatchError;
use revmatch_extract::{DocumentExtractor, TextExtractor};
use revmatch_index::{
    ingest_corpus, AuthorCorpus, DynEmbeddingService, IndexManager, IndexSnapshot,
    MockEmbedding, OnnxEmbeddingService, QueryEngine, RecommendOutcome, Recommender,
};

use cli::{AddArgs, CliArgs, Command};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load the config file, remembering why it could not be read so the failure
/// can be logged once tracing is up.
fn load_config(path: &Path) -> (RevmatchConfig, Option<RevmatchError>) {
    if !path.exists() {
        return (RevmatchConfig::default(), None);
    }
    match RevmatchConfig::load(path) {
        Ok(config) => (config, None),
        Err(e) => (RevmatchConfig::default(), Some(e)),
    }
}

/// Pick the embedding backend named in `[embedding] backend`.
fn build_embedder(config: &RevmatchConfig) -> AppResult<Box<dyn DynEmbeddingService>> {
    match config.embedding.backend.as_str() {
        "onnx" => {
            let model_dir = expand_home(&config.embedding.model_dir);
            let service =
                OnnxEmbeddingService::from_directory(&model_dir, config.embedding.max_seq_len)
                    .map_err(|e| {
                        tracing::error!(
                            model_dir = %model_dir.display(),
                            error = %e,
                            "Failed to load embedding model"
                        );
                        tracing::error!(
                            "Download {} into the model directory or set [embedding] backend = \"mock\"",
                            config.embedding.model_name
                        );
                        e
                    })?;
            tracing::info!(model = %config.embedding.model_name, "ONNX embedding model loaded");
            Ok(Box::new(service))
        }
        "mock" => {
            tracing::warn!("Using mock embeddings; scores are not semantically meaningful");
            Ok(Box::new(MockEmbedding::with_dimensions(
                config.search.embedding_dim,
            )))
        }
        other => Err(RevmatchError::Config(format!(
            "unknown embedding backend '{}' (expected \"onnx\" or \"mock\")",
            other
        ))
        .into()),
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Extract the document first and load the embedding model only when
/// there is text to embed.
async fn recommend_document(
    config: &RevmatchConfig,
    engine: QueryEngine,
    document: &Path,
    k: usize,
) -> AppResult<RecommendOutcome> {
    let extractor = DocumentExtractor::new();
    let text = extractor.extract_text(document).await?;
    if text.trim().is_empty() {
        tracing::info!(document = %document.display(), "No text extracted, nothing to match");
        return Ok(RecommendOutcome::NoText);
    }

    let recommender = Recommender::new_dyn(engine, Box::new(extractor), build_embedder(config)?);
    Ok(recommender.recommend_text(&text, k).await?)
}

async fn run_recommend(
    config: &RevmatchConfig,
    engine: QueryEngine,
    document: &Path,
    k: Option<usize>,
    json: bool,
) -> AppResult<()> {
    let k = config.search.clamp_k(k);
    let outcome = recommend_document(config, engine, document, k).await?;
    if json {
        return print_json(&outcome.into_results());
    }
    match outcome {
        RecommendOutcome::NoText => {
            println!("No text could be extracted from {}", document.display());
        }
        RecommendOutcome::NoCandidates => {
            println!("No reviewer embeddings found. Add reviewers or run `revmatch ingest` first.");
        }
        RecommendOutcome::Matches(results) => {
            for (rank, r) in results.iter().enumerate() {
                println!("{:>2}. {} (score: {:.4})", rank + 1, r.name, r.score);
            }
        }
    }
    Ok(())
}

async fn run_add(config: &RevmatchConfig, engine: QueryEngine, args: AddArgs) -> AppResult<()> {
    let summary = match (args.text, args.text_file) {
        (Some(text), _) => text,
        (None, Some(path)) => tokio::fs::read_to_string(&path).await?,
        (None, None) => {
            return Err(RevmatchError::InvalidInput(
                "either --text or --text-file is required".to_string(),
            )
            .into())
        }
    };

    let recommender = Recommender::new_dyn(
        engine,
        Box::new(DocumentExtractor::new()),
        build_embedder(config)?,
    );
    recommender
        .add_reviewer_from_text(&args.name, &summary)
        .await?;
    println!("Added reviewer {}", args.name.trim());
    Ok(())
}

/// Returns the rebuilt snapshot, or `None` when the corpus has no readable
/// papers and the store was left as it was.
async fn ingest(
    config: &RevmatchConfig,
    manager: &IndexManager,
    corpus: &AuthorCorpus,
) -> AppResult<Option<IndexSnapshot>> {
    if corpus.paper_count() == 0 {
        return Ok(None);
    }
    tracing::info!(
        authors = corpus.len(),
        papers = corpus.paper_count(),
        "Embedding author corpus"
    );

    let embedder = build_embedder(config)?;
    Ok(Some(ingest_corpus(manager, corpus, embedder.as_ref()).await?))
}

async fn run_ingest(
    config: &RevmatchConfig,
    manager: &IndexManager,
    corpus_dir: &Path,
) -> AppResult<()> {
    let corpus = AuthorCorpus::from_dir(corpus_dir)?;
    match ingest(config, manager, &corpus).await? {
        Some(snapshot) => println!(
            "Ingested {} authors ({} papers); index holds {} reviewers",
            corpus.len(),
            corpus.paper_count(),
            snapshot.len()
        ),
        None => println!(
            "No readable papers found under {}; reviewer store left unchanged",
            corpus_dir.display()
        ),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let (mut config, config_error) = load_config(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    let log_level = args
        .resolve_log_level()
        .unwrap_or_else(|| config.general.log_level.clone());

    // Tracing. An explicit --log-level beats RUST_LOG.
    let filter = if args.log_level.is_some() {
        tracing_subscriber::EnvFilter::new(&log_level)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match config_error {
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
        None => tracing::debug!(path = %config_file.display(), "Configuration resolved"),
    }

    // Persisted state.
    let paths = config.index_paths();
    tracing::debug!(
        store = %paths.embedding_store.display(),
        index = %paths.index.display(),
        name_map = %paths.name_map.display(),
        "Index paths resolved"
    );
    let manager = Arc::new(IndexManager::new(paths, config.search.embedding_dim));

    match args.command {
        Command::Recommend { document, k } => {
            let engine = QueryEngine::new(Arc::clone(&manager));
            run_recommend(&config, engine, &document, k, args.json).await?;
        }
        Command::Add(add) => {
            let engine = QueryEngine::new(Arc::clone(&manager));
            run_add(&config, engine, add).await?;
        }
        Command::Remove { name } => {
            if manager.unregister_reviewer(&name)? {
                println!("Removed reviewer {}", name);
            } else {
                println!("No reviewer named {}", name);
            }
        }
        Command::Rebuild => {
            let snapshot = manager.build()?;
            println!("Index rebuilt with {} reviewers", snapshot.len());
        }
        Command::List => {
            let names = manager.store().names()?;
            if args.json {
                print_json(&names)?;
            } else if names.is_empty() {
                println!("No reviewers stored");
            } else {
                for name in &names {
                    println!("{}", name);
                }
            }
        }
        Command::Ingest { corpus_dir } => {
            run_ingest(&config, &manager, &corpus_dir).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use revmatch_core::config::IndexPaths;

    fn config_with_backend(backend: &str, model_dir: &Path) -> RevmatchConfig {
        let mut config = RevmatchConfig::default();
        config.embedding.backend = backend.to_string();
        config.embedding.model_dir = model_dir.to_string_lossy().into_owned();
        config.search.embedding_dim = 8;
        config
    }

    fn manager_with_reviewers(dir: &Path) -> Arc<IndexManager> {
        let manager = IndexManager::new(IndexPaths::in_dir(dir), 8);
        manager.register_reviewer("Alice", vec![1.0; 8]).unwrap();
        manager.register_reviewer("Bob", vec![-1.0; 8]).unwrap();
        Arc::new(manager)
    }

    #[tokio::test]
    async fn test_blank_document_skips_model_loading() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_backend("onnx", &dir.path().join("no-model"));
        let engine = QueryEngine::new(manager_with_reviewers(dir.path()));

        let document = dir.path().join("scan.txt");
        std::fs::write(&document, "  \n ").unwrap();

        let outcome = recommend_document(&config, engine, &document, 5)
            .await
            .unwrap();
        assert_eq!(outcome, RecommendOutcome::NoText);
    }

    #[tokio::test]
    async fn test_document_with_text_needs_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_backend("onnx", &dir.path().join("no-model"));
        let engine = QueryEngine::new(manager_with_reviewers(dir.path()));

        let document = dir.path().join("paper.txt");
        std::fs::write(&document, "graph algorithms").unwrap();

        assert!(recommend_document(&config, engine, &document, 5)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_ingest_of_blank_corpus_keeps_reviewers() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_backend("mock", &dir.path().join("unused"));
        let manager = manager_with_reviewers(dir.path());

        let corpus_dir = tempfile::tempdir().unwrap();
        let carol = corpus_dir.path().join("Carol");
        std::fs::create_dir_all(&carol).unwrap();
        std::fs::write(carol.join("p.txt"), "   \n").unwrap();
        let corpus = AuthorCorpus::from_dir(corpus_dir.path()).unwrap();

        assert!(ingest(&config, &manager, &corpus).await.unwrap().is_none());
        assert_eq!(manager.store().names().unwrap(), ["Alice", "Bob"]);
        assert_eq!(manager.load_or_build().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_replaces_store_with_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_backend("mock", &dir.path().join("unused"));
        let manager = manager_with_reviewers(dir.path());

        let corpus_dir = tempfile::tempdir().unwrap();
        let shannon = corpus_dir.path().join("Shannon");
        std::fs::create_dir_all(&shannon).unwrap();
        std::fs::write(shannon.join("p.txt"), "a mathematical theory of communication")
            .unwrap();
        let corpus = AuthorCorpus::from_dir(corpus_dir.path()).unwrap();

        let snapshot = ingest(&config, &manager, &corpus).await.unwrap().unwrap();
        assert_eq!(snapshot.names(), ["Shannon"]);
    }
}
